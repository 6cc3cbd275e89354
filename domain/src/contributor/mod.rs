//! Contributor bookkeeping
//!
//! - [`tracker::ResponseTracker`]: who must still answer in a phase
//! - [`selected::SelectedContributor`]: a contributor chosen for execution
//! - [`selector::ComponentSelector`]: selection policies for identification

pub mod selected;
pub mod selector;
pub mod tracker;

pub use selected::SelectedContributor;
pub use selector::{
    AllContributorsSelector, ComponentSelector, FastestContributorSelector, IdentifyReply,
    SelectionPolicy, SpecificContributorSelector,
};
pub use tracker::ResponseTracker;
