pub mod time_domain_convolver;

pub use crate::building_blocks::convolver::time_domain_convolver::TimeDomainConvolver;
