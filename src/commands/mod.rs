mod check;
mod down;
mod get;
mod up;
mod validate;

pub use check::run_check;
pub use down::run_down;
pub use get::run_get;
pub use up::run_up;
pub use validate::run_validate;

use testservices::{Collection, Provider};

/// Providers for the named needs, or every provider when none are named.
fn select_providers<'a>(
    collection: &'a Collection,
    needs: &[String],
) -> testservices::Result<Vec<&'a Provider>> {
    if needs.is_empty() {
        return Ok(collection.providers().iter().collect());
    }
    needs.iter().map(|need| collection.obtain(need)).collect()
}
