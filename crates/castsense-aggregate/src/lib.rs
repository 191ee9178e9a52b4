//! CastSense Aggregate: joins attributions with the episode calendar and
//! rolls them up per entity and episode.

pub mod calendar;
pub mod episode;
pub mod rollup;

pub use calendar::Calendar;
pub use episode::extract_episode_number;
pub use rollup::{
    aggregate, classify, entity_overview, expand, EntityOverview, NEGATIVE_THRESHOLD,
    POSITIVE_THRESHOLD,
};
