//! Team and side bookkeeping
//!
//! Teams swap sides at halftime (and in overtime), so side heatmaps are
//! attributed to teams round by round.

mod resolver;
mod teams;

pub use resolver::{
    RoundSideAssignment, RoundSides, SideResolver, TeamLookup, resolve, resolve_with_window,
    team_lookup,
};
pub use teams::TeamPair;
