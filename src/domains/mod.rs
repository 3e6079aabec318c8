//! Domain Query Modules
//!
//! One module per directory area, each a thin layer of cached reads and
//! invalidating writes over its data source trait.

pub mod console;
pub mod hours;
pub mod memberships;
pub mod schedule;

pub use console::{ConsoleQueries, ConsoleSource};
pub use hours::{HoursQueries, HoursSource};
pub use memberships::{MembershipQueries, MembershipSource};
pub use schedule::{ScheduleQueries, ScheduleSource};
