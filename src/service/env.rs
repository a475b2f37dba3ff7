use super::{Availability, ConnectionHandle, Service, DATABASE, PASSWORD, USER};
use crate::config::VarSource;
use crate::error::{Error, Result};
use crate::port::{PortWaiter, DEFAULT_WAIT_TIMEOUT};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// A handle parameter read from a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParamVar {
    variable: String,
    required: bool,
}

/// Host, port and parameters read out of the variables.
#[derive(Debug)]
struct Endpoint {
    host: String,
    port: u16,
    /// Whether the port came from the environment and can be checked.
    live_port: bool,
    params: BTreeMap<String, String>,
}

/// An externally managed instance described by environment variables.
///
/// Nothing is ever started: `create()` is a no-op and `destroy()` keeps the
/// default no-op. The connection comes from a URL-style variable
/// (`DATABASE_URL=postgresql://user:pw@host:5432/db`), from discrete host,
/// port and parameter variables, or from both, in which case the discrete
/// variables override fields of the URL.
///
/// Liveness is only checked when the port comes from the environment; with a
/// host variable alone `exists()` is `true` without touching the network.
#[derive(Debug, Clone)]
pub struct EnvService {
    name: String,
    vars: VarSource,
    url_var: Option<String>,
    host_var: Option<String>,
    port_var: Option<String>,
    default_port: Option<u16>,
    scheme: Option<String>,
    params: BTreeMap<String, ParamVar>,
    timeout: Duration,
}

impl EnvService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: VarSource::Process,
            url_var: None,
            host_var: None,
            port_var: None,
            default_port: None,
            scheme: None,
            params: BTreeMap::new(),
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Discrete host and port variables, e.g. `("PGHOST", "PGPORT")`.
    pub fn host_port(name: impl Into<String>, host_var: &str, port_var: &str) -> Self {
        Self::new(name).with_host_var(host_var).with_port_var(port_var)
    }

    /// A single URL-style variable such as `DATABASE_URL`.
    pub fn url(name: impl Into<String>, url_var: &str) -> Self {
        Self::new(name).with_url_var(url_var)
    }

    /// The libpq variables: `PGHOST`, `PGPORT` (required), and the optional
    /// `PGUSER`, `PGPASSWORD`, `PGDATABASE`.
    pub fn postgres(name: impl Into<String>) -> Self {
        Self::host_port(name, "PGHOST", "PGPORT")
            .with_default_port(5432)
            .with_scheme("postgresql")
            .with_optional_param(USER, "PGUSER")
            .with_optional_param(PASSWORD, "PGPASSWORD")
            .with_optional_param(DATABASE, "PGDATABASE")
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn with_vars(mut self, vars: VarSource) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_url_var(mut self, variable: impl Into<String>) -> Self {
        self.url_var = Some(variable.into());
        self
    }

    pub fn with_host_var(mut self, variable: impl Into<String>) -> Self {
        self.host_var = Some(variable.into());
        self
    }

    pub fn with_port_var(mut self, variable: impl Into<String>) -> Self {
        self.port_var = Some(variable.into());
        self
    }

    /// Port used when no variable supplies one. Never liveness-checked.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Handle parameter `key` read from `variable`, which must be set.
    pub fn with_param(mut self, key: impl Into<String>, variable: impl Into<String>) -> Self {
        self.params.insert(
            key.into(),
            ParamVar {
                variable: variable.into(),
                required: true,
            },
        );
        self
    }

    /// Handle parameter `key` read from `variable` when it is set.
    pub fn with_optional_param(
        mut self,
        key: impl Into<String>,
        variable: impl Into<String>,
    ) -> Self {
        self.params.insert(
            key.into(),
            ParamVar {
                variable: variable.into(),
                required: false,
            },
        );
        self
    }

    /// Bound on waiting for the port in `get()`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Variables that must be set for this service to be possible.
    ///
    /// A set URL variable stands in for the host and port variables.
    pub fn required_vars(&self) -> Vec<&str> {
        let mut required = Vec::new();
        let url_set = match &self.url_var {
            Some(var) => self.vars.non_empty(var).is_some(),
            None => false,
        };
        if !url_set {
            match (&self.url_var, &self.host_var) {
                (_, Some(host)) => {
                    required.push(host.as_str());
                    if let Some(port) = &self.port_var {
                        required.push(port.as_str());
                    }
                }
                (Some(url), None) => required.push(url.as_str()),
                (None, None) => {}
            }
        }
        required.extend(
            self.params
                .values()
                .filter(|p| p.required)
                .map(|p| p.variable.as_str()),
        );
        required
    }

    fn missing_vars(&self) -> Vec<&str> {
        self.required_vars()
            .into_iter()
            .filter(|var| self.vars.non_empty(var).is_none())
            .collect()
    }

    fn missing_error(&self, var: &str) -> Error {
        Error::configuration(var, "is not set")
    }

    fn parse_port(&self, variable: &str, value: &str) -> Result<u16> {
        match value.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(Error::configuration(
                variable,
                format!("is not a valid port number: '{}'", value),
            )),
            Ok(port) => Ok(port),
        }
    }

    /// Host, port and parameters from the URL variable, when set.
    fn endpoint_from_url(
        &self,
        variable: &str,
        raw: &str,
    ) -> Result<(Option<String>, Option<u16>, BTreeMap<String, String>)> {
        let malformed = |reason: String| Error::configuration(variable, reason);
        let url = url::Url::parse(raw.trim())
            .map_err(|e| malformed(format!("is not a valid URL ({}): '{}'", e, raw)))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string());
        let decode = |field: &str, value: &str| -> Result<String> {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .map_err(|_| malformed(format!("has an undecodable {}", field)))
        };

        let mut params = BTreeMap::new();
        if !url.username().is_empty() {
            params.insert(USER.to_string(), decode("user", url.username())?);
        }
        if let Some(password) = url.password() {
            params.insert(PASSWORD.to_string(), decode("password", password)?);
        }
        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            params.insert(DATABASE.to_string(), decode("database", database)?);
        }
        for (key, value) in url.query_pairs() {
            params.insert(key.into_owned(), value.into_owned());
        }
        Ok((host, url.port(), params))
    }

    fn endpoint(&self) -> Result<Endpoint> {
        let mut host = None;
        let mut port = None;
        let mut params = BTreeMap::new();

        if let Some(var) = &self.url_var {
            if let Some(raw) = self.vars.non_empty(var) {
                let (url_host, url_port, url_params) = self.endpoint_from_url(var, &raw)?;
                host = url_host;
                port = url_port;
                params = url_params;
            }
        }

        if let Some(var) = &self.host_var {
            if let Some(value) = self.vars.non_empty(var) {
                host = Some(value.trim().to_string());
            }
        }
        if let Some(var) = &self.port_var {
            if let Some(value) = self.vars.non_empty(var) {
                port = Some(self.parse_port(var, &value)?);
            }
        }
        for (key, param) in &self.params {
            match self.vars.non_empty(&param.variable) {
                Some(value) => {
                    params.insert(key.clone(), value);
                }
                None if param.required => return Err(self.missing_error(&param.variable)),
                None => {}
            }
        }

        let host = match host {
            Some(host) => host,
            None => {
                let var = self
                    .host_var
                    .as_deref()
                    .or(self.url_var.as_deref())
                    .unwrap_or("host");
                return Err(self.missing_error(var));
            }
        };
        let live_port = port.is_some();
        let port = match port.or(self.default_port) {
            Some(port) => port,
            None => {
                let var = self
                    .port_var
                    .as_deref()
                    .or(self.url_var.as_deref())
                    .unwrap_or("port");
                return Err(Error::configuration(var, "does not provide a port"));
            }
        };

        Ok(Endpoint {
            host,
            port,
            live_port,
            params,
        })
    }

    fn waiter(&self, endpoint: &Endpoint) -> PortWaiter {
        PortWaiter::new(&endpoint.host, endpoint.port)
            .with_timeout(self.timeout)
            .labeled(format!("service '{}'", self.name))
    }
}

#[async_trait]
impl Service for EnvService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "environment"
    }

    async fn availability(&self) -> Result<Availability> {
        if self.url_var.is_none() && self.host_var.is_none() {
            return Ok(Availability::Unavailable(
                "no host or URL variable declared".to_string(),
            ));
        }
        let missing = self.missing_vars();
        Ok(match missing.as_slice() {
            [] => Availability::Available,
            [one] => Availability::Unavailable(format!("variable {} unset", one)),
            many => Availability::Unavailable(format!("variables {} unset", many.join(", "))),
        })
    }

    async fn exists(&self) -> Result<bool> {
        let endpoint = self.endpoint()?;
        if !endpoint.live_port {
            return Ok(true);
        }
        self.waiter(&endpoint).check().await
    }

    /// No-op: an environment-backed instance is managed by someone else.
    async fn create(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self) -> Result<ConnectionHandle> {
        let endpoint = self.endpoint()?;
        if endpoint.live_port {
            self.waiter(&endpoint).wait().await?;
        }
        let mut handle = ConnectionHandle::new(endpoint.host, endpoint.port);
        handle.scheme = self.scheme.clone();
        handle.params = endpoint.params;
        Ok(handle)
    }
}
