pub mod markup;
pub mod pricing;

pub use markup::{MarkupRepository, MarkupRule, MarkupType};
pub use pricing::{price_package, PricingEngine, PricingError};
