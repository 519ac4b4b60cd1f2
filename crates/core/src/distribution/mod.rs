//! Payment distribution across pending debits.
//!
//! - `payment` - one payer, one entry per payee, oldest debt first
//! - `guardian` - one lump sum across linked payees, largest balance first

pub mod guardian;
pub mod payment;

pub use guardian::{
    GuardianDistribution, GuardianPaymentDistributor, GuardianPaymentRequest, PayeeDistribution,
};
pub use payment::{PayeeSettlement, PaymentDistribution, PaymentDistributor, PaymentRequest};
