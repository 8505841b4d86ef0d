//! Holder of the currently loaded model.

use std::sync::{Arc, PoisonError, RwLock};

use super::{ModelError, ModelResult, TrainedModel};

/// The currently loaded trained model.
///
/// Installing a new model swaps the `Arc`; queries already holding the old one
/// finish against it.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded model, returning the previous one.
    pub fn install(&self, model: TrainedModel) -> Option<Arc<TrainedModel>> {
        let model = Arc::new(model);
        tracing::info!(model_id = %model.meta().model_id, "installing model");
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(model)
    }

    /// The loaded model, or [`ModelError::NotLoaded`].
    pub fn current(&self) -> ModelResult<Arc<TrainedModel>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ModelError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::train;
    use crate::scorer::SimilarityWeights;

    #[test]
    fn test_not_loaded_is_fatal() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_loaded());
        assert!(matches!(registry.current(), Err(ModelError::NotLoaded)));
    }

    #[test]
    fn test_swap_keeps_in_flight_model() {
        let registry = ModelRegistry::new();
        let first = train(vec![], SimilarityWeights::default()).unwrap();
        let first_id = first.meta().model_id.clone();
        assert!(registry.install(first).is_none());

        let in_flight = registry.current().unwrap();
        let previous = registry
            .install(train(vec![], SimilarityWeights::default()).unwrap())
            .unwrap();

        assert_eq!(in_flight.meta().model_id, first_id);
        assert_eq!(previous.meta().model_id, first_id);
        assert_ne!(registry.current().unwrap().meta().model_id, first_id);
    }
}
