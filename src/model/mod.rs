//! Purchase-order data model.
//!
//! These types are shared by the page adapter, the extraction tiers, the
//! validator and the renderers. A [`DocumentRecord`] owns its line items and
//! size breakdowns; a size breakdown refers to its line item by product id.

mod field;
mod issue;
mod line_item;
mod page;
mod record;

pub use field::{Field, Provenance, Tier};
pub use issue::{IssueKind, QaReport, Severity, ValidationIssue};
pub use line_item::{round_money, LineItem, SizeBreakdown, SizeQuantity};
pub use page::{BoundingBox, PageTable, PagePrimitive, WordToken};
pub use record::{DocumentRecord, PartialRecord, Summary, ValidatedRecord};
