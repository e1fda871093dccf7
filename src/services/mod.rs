//! Consistency services: invariants that span several repositories and run
//! at startup or on demand.

mod bootstrap;
mod integrity;
mod managing_partner;
mod mock_data;
mod reset;

pub use bootstrap::{AppInitializer, InitReport};
pub use integrity::{DanglingReference, IntegrityReport, IntegrityService, TypeMismatch};
pub use managing_partner::ManagingPartnerService;
pub use mock_data::{MockDataGenerator, MockDataOptions};
pub use reset::ResetService;
