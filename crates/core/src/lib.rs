pub mod analytics;
pub mod config;
pub mod domain;
pub mod errors;
pub mod experiments;

pub use analytics::{
    AnalyticsReport, AnalyticsSnapshot, BackfillPlan, BackfillReport, DealAnalyticsEngine,
    Recommendation, RecommendationGenerator, SchemaStatus,
};
pub use domain::deal::{Deal, DealId, ProductId, ReorderDirection};
pub use domain::order::{LineItemId, Order, OrderId, OrderItem, OrderStatus};
pub use domain::period::DateRange;
pub use domain::redemption::{PurchaseEvent, PurchaseEventId, RedemptionKey};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use experiments::{AbTest, AbTestId, AbTestStatus, NewAbTest, Variant, VariantLabel};
