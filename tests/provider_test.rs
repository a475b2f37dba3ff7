// Candidate selection through a Provider.

mod common;

use async_trait::async_trait;
use common::{FakeRuntime, Untouchable};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use testservices::service::Availability;
use testservices::{
    ConnectionHandle, ContainerService, ContainerSpec, EnvService, Error, Provider, Service,
    VarSource,
};

/// Records every lifecycle call it receives.
struct Recorder {
    name: String,
    available: bool,
    exists: bool,
    fail_create: bool,
    port: u16,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new(name: &str, available: bool, calls: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            available,
            exists: false,
            fail_create: false,
            port: 1,
            calls: Arc::clone(calls),
        }
    }

    fn record(&self, op: &str) {
        self.calls.lock().push(format!("{}.{}", self.name, op));
    }
}

#[async_trait]
impl Service for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn availability(&self) -> testservices::Result<Availability> {
        self.record("possible");
        Ok(if self.available {
            Availability::Available
        } else {
            Availability::Unavailable(format!("{} is switched off", self.name))
        })
    }

    async fn exists(&self) -> testservices::Result<bool> {
        self.record("exists");
        Ok(self.exists)
    }

    async fn create(&self) -> testservices::Result<()> {
        self.record("create");
        if self.fail_create {
            return Err(Error::Provisioning {
                service: self.name.clone(),
                message: "port is already allocated".to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self) -> testservices::Result<ConnectionHandle> {
        self.record("get");
        Ok(ConnectionHandle::new("127.0.0.1", self.port))
    }
}

#[tokio::test]
async fn test_first_possible_candidate_short_circuits() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let provider = Provider::new("db")
        .with(Recorder::new("a", true, &calls))
        .with(Untouchable("b"));

    let handle = provider.get_instance().await.unwrap();
    assert_eq!(handle.port, 1);
    assert_eq!(
        *calls.lock(),
        vec!["a.possible", "a.exists", "a.create", "a.get"]
    );
}

#[tokio::test]
async fn test_existing_candidate_is_not_created() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut existing = Recorder::new("a", true, &calls);
    existing.exists = true;
    let provider = Provider::new("db").with(existing);

    let resolution = provider.resolve().await.unwrap();
    assert!(!resolution.created);
    assert_eq!(resolution.service, "a");
    assert_eq!(*calls.lock(), vec!["a.possible", "a.exists", "a.get"]);
}

#[tokio::test]
async fn test_no_candidate_possible_lists_every_rejection() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let provider = Provider::new("db")
        .with(Recorder::new("a", false, &calls))
        .with(Recorder::new("b", false, &calls));

    match provider.get_instance().await {
        Err(Error::NoServiceAvailable { need, rejections }) => {
            assert_eq!(need, "db");
            let names: Vec<_> = rejections.iter().map(|r| r.service.as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
            assert_eq!(rejections[1].reason, "b is switched off");
        }
        other => panic!("expected NoServiceAvailable, got {:?}", other),
    }
    assert_eq!(*calls.lock(), vec!["a.possible", "b.possible"]);
}

#[tokio::test]
async fn test_failed_create_does_not_fall_through() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut broken = Recorder::new("a", true, &calls);
    broken.fail_create = true;
    let provider = Provider::new("db")
        .with(broken)
        .with(Untouchable("b"));

    match provider.get_instance().await {
        Err(Error::Provisioning { service, message }) => {
            assert_eq!(service, "a");
            assert!(message.contains("already allocated"));
        }
        other => panic!("expected Provisioning, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_runtime_and_no_variables() {
    let runtime = Arc::new(FakeRuntime::unreachable());
    let provider = Provider::new("postgres")
        .with(ContainerService::new(
            ContainerSpec::new("pg-test", "postgres:16", 5432),
            runtime.clone(),
        ))
        .with(
            EnvService::host_port("pg-env", "PGHOST", "PGPORT")
                .with_vars(VarSource::fixed(Vec::<(String, String)>::new())),
        );

    let err = provider.get_instance().await.unwrap_err();
    match &err {
        Error::NoServiceAvailable { rejections, .. } => {
            assert_eq!(rejections.len(), 2);
            assert_eq!(rejections[0].service, "pg-test");
            assert!(rejections[0].reason.contains("unreachable"));
            assert_eq!(rejections[1].service, "pg-env");
            assert_eq!(rejections[1].reason, "variables PGHOST, PGPORT unset");
        }
        other => panic!("expected NoServiceAvailable, got {:?}", other),
    }
    let text = err.to_string();
    assert!(text.contains("pg-test"));
    assert!(text.contains("pg-env"));
    assert_eq!(runtime.starts(), 0);
}

#[tokio::test]
async fn test_env_candidate_preferred_over_container() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let runtime = Arc::new(FakeRuntime::new());

    let provider = Provider::new("postgres")
        .with(
            EnvService::host_port("pg-env", "PGHOST", "PGPORT").with_vars(VarSource::fixed([
                ("PGHOST", "127.0.0.1".to_string()),
                ("PGPORT", port.to_string()),
            ])),
        )
        .with(ContainerService::new(
            ContainerSpec::new("pg-test", "postgres:16", 5432),
            runtime.clone(),
        ));

    let resolution = provider.resolve().await.unwrap();
    assert_eq!(resolution.service, "pg-env");
    assert_eq!(resolution.kind, "environment");
    assert_eq!(resolution.handle.port, port);
    assert_eq!(runtime.starts(), 0);
}

#[tokio::test]
async fn test_second_resolution_reuses_running_container() {
    let runtime = Arc::new(FakeRuntime::new());
    let provider = Provider::new("postgres")
        .with(ContainerService::new(
            ContainerSpec::new("pg-test", "postgres:16", 5432),
            runtime.clone(),
        ))
        .with(
            EnvService::host_port("pg-env", "PGHOST", "PGPORT")
                .with_vars(VarSource::fixed(Vec::<(String, String)>::new())),
        );

    let first = provider.resolve().await.unwrap();
    assert!(first.created);
    assert_eq!(first.service, "pg-test");

    let second = provider.resolve().await.unwrap();
    assert!(!second.created);
    assert_eq!(second.service, "pg-test");
    assert_eq!(second.handle.port, first.handle.port);
    assert_eq!(runtime.starts(), 1);
    assert_eq!(runtime.restarts(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the availability pattern, the first available candidate wins
    /// and nothing after it is asked anything.
    #[test]
    fn prop_first_available_candidate_wins(available in proptest::collection::vec(any::<bool>(), 1..8)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut provider = Provider::new("db");
        for (i, on) in available.iter().enumerate() {
            let mut candidate = Recorder::new(&format!("c{}", i), *on, &calls);
            candidate.port = i as u16 + 1;
            provider.push(Box::new(candidate));
        }

        let result = runtime.block_on(provider.get_instance());
        let asked: Vec<String> = calls
            .lock()
            .iter()
            .filter(|c| c.ends_with(".possible"))
            .cloned()
            .collect();

        match available.iter().position(|on| *on) {
            Some(winner) => {
                prop_assert_eq!(result.unwrap().port, winner as u16 + 1);
                prop_assert_eq!(asked.len(), winner + 1);
            }
            None => {
                prop_assert!(
                    matches!(result, Err(Error::NoServiceAvailable { ref rejections, .. }) if rejections.len() == available.len()),
                    "expected NoServiceAvailable"
                );
                prop_assert_eq!(asked.len(), available.len());
            }
        }
    }
}
