//! # Store Sales
//!
//! Per-store, per-family daily sales forecasting: a training pipeline and a
//! prediction service that share one feature-alignment contract.
//!
//! - [`feature_align`]: feature building, column alignment and scaling
//! - [`sales_forecast`]: raw data merge, regressors, training run, analytics
//! - [`sales_server`]: the HTTP prediction service
//!
//! ## Example
//!
//! ```
//! use store_sales_workspace::feature_align::RecordInput;
//!
//! let request = RecordInput {
//!     date: Some("2017-08-16".to_string()),
//!     family: Some("BEVERAGES".to_string()),
//!     state: Some("Pichincha".to_string()),
//!     city: Some("Quito".to_string()),
//!     type_x: Some("D".to_string()),
//!     store_nbr: Some(1),
//!     ..RecordInput::default()
//! };
//! let record = request.into_record().unwrap();
//! assert_eq!(record.day_type_or_default(), "Regular Day");
//! assert_eq!(record.transactions, Some(1000.0));
//! ```

pub use feature_align;
pub use sales_forecast;
pub use sales_server;
