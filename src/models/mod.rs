mod field;
mod mapping;

pub use field::{FieldKey, UnknownFieldKey};
pub use mapping::{
    AggregatedMatch, LearnedMapping, LearnedMappings, MappingAction, MappingResult, StrategyId,
    StrategyResult,
};
