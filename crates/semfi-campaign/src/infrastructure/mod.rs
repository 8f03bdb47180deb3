//! Infrastructure for the campaign driver.
//!
//! Everything that touches the outside world lives here: the serial
//! transport and its background reader, the SEM protocol session, the
//! register-injection backend, the materialized-pool file loader, and the
//! CLI shim.  The application layer depends on these through narrow
//! constructors and traits, never the other way around.

pub mod cli;
pub mod pool_file;
pub mod reg;
pub mod sem;
pub mod transport;
