use log::{debug, info};

use crate::data::ModuleName;
use crate::error::Result;
use crate::model::IcaData;
use crate::threshold::{self, ThresholdDecision, ThresholdInput, Thresholds};

impl IcaData {
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Replaces every threshold. The D'Agostino cutoff no longer applies afterwards.
    pub fn set_thresholds(&mut self, thresholds: impl Into<ThresholdInput>) -> Result<()> {
        let thresholds = thresholds.into().resolve(self.m.cols())?;
        self.thresholds = thresholds;
        self.dagostino_cutoff = None;
        self.cutoff_optimized = false;
        Ok(())
    }

    pub fn change_threshold(&mut self, imodulon: &ModuleName, value: f64) -> Result<()> {
        self.thresholds.set(imodulon, value)?;
        info!("Threshold of iModulon {} set to {}", imodulon, value);
        self.cutoff_optimized = false;
        Ok(())
    }

    /// Recomputes every threshold with the D'Agostino method at `cutoff`.
    pub fn recompute_thresholds(&mut self, cutoff: u32) {
        self.apply_dagostino_cutoff(cutoff);
        self.cutoff_optimized = false;
    }

    /// Recomputes every threshold by clustering absolute weights.
    pub fn compute_kmeans_thresholds(&mut self) {
        debug!("Computing k-means thresholds for {} iModulons", self.m.ncols());
        self.thresholds = threshold::compute_kmeans_thresholds(&self.m);
        self.dagostino_cutoff = None;
    }

    /// Cutoff the current thresholds derive from, `None` for manual or k-means thresholds.
    pub fn dagostino_cutoff(&self) -> Option<u32> {
        self.dagostino_cutoff
    }

    pub fn cutoff_optimized(&self) -> bool {
        self.cutoff_optimized
    }

    pub fn threshold_decision(&self) -> ThresholdDecision {
        self.threshold_decision
    }

    pub(crate) fn apply_dagostino_cutoff(&mut self, cutoff: u32) {
        self.thresholds = threshold::compute_dagostino_thresholds(&self.m, cutoff);
        self.dagostino_cutoff = Some(cutoff);
    }

    /// Records the cutoff of thresholds restored from a saved model.
    pub(crate) fn restore_dagostino_cutoff(&mut self, cutoff: Option<u32>) {
        self.dagostino_cutoff = cutoff;
    }
}

#[cfg(test)]
mod tests {
    use crate::data::{LabeledMatrix, ModuleName};
    use crate::error::ModulonError;
    use crate::model::IcaData;
    use crate::model::IcaDataOptions;
    use ndarray::Array2;
    use std::collections::HashMap;

    fn model() -> IcaData {
        let genes: Vec<String> = (0..30).map(|i| format!("b{}", i)).collect();
        let m = Array2::from_shape_fn((30, 2), |(i, j)| {
            let base = ((i * 7 + j * 3) % 11) as f64 * 0.004 - 0.02;
            if i < 3 && j == 0 { 0.5 - i as f64 * 0.05 } else { base }
        });
        let m: crate::model::WeightMatrix = LabeledMatrix::new(genes, vec![ModuleName::Index(0), ModuleName::Index(1)], m).unwrap();
        let a: crate::model::ActivityMatrix = LabeledMatrix::new(
            vec![ModuleName::Index(0), ModuleName::Index(1)],
            vec!["s1".into()],
            Array2::zeros((2, 1)),
        )
        .unwrap();
        IcaData::new(m, a, IcaDataOptions::default().with_threshold_method("kmeans")).unwrap()
    }

    #[test]
    fn kmeans_model_has_no_cutoff() {
        let data = model();
        assert_eq!(data.dagostino_cutoff(), None);
        assert_eq!(data.thresholds().len(), 2);
    }

    #[test]
    fn recompute_records_cutoff() {
        let mut data = model();
        data.recompute_thresholds(550);
        assert_eq!(data.dagostino_cutoff(), Some(550));
        assert!(!data.cutoff_optimized());
    }

    #[test]
    fn manual_thresholds_clear_cutoff() {
        let mut data = model();
        data.recompute_thresholds(550);
        let mut map = HashMap::new();
        map.insert(ModuleName::Index(0), 0.2);
        map.insert(ModuleName::Index(1), 0.3);
        data.set_thresholds(map).unwrap();
        assert_eq!(data.dagostino_cutoff(), None);
        assert_eq!(data.thresholds().get(&ModuleName::Index(1)), Some(0.3));
    }

    #[test]
    fn change_threshold_requires_known_module() {
        let mut data = model();
        data.change_threshold(&ModuleName::Index(0), 0.1).unwrap();
        assert_eq!(data.thresholds().get(&ModuleName::Index(0)), Some(0.1));
        let err = data.change_threshold(&ModuleName::Index(7), 0.1).unwrap_err();
        assert!(matches!(err, ModulonError::UnknownModule(_)));
    }

    #[test]
    fn negative_threshold_leaves_model_unchanged() {
        let mut data = model();
        let before = data.thresholds().clone();
        let err = data.change_threshold(&ModuleName::Index(1), -0.2).unwrap_err();
        assert!(matches!(err, ModulonError::Schema(_)));
        assert_eq!(data.thresholds(), &before);
        assert!(data.set_thresholds(vec![0.1, f64::NAN]).is_err());
        assert_eq!(data.thresholds(), &before);
    }

    #[test]
    fn threshold_list_must_match() {
        let mut data = model();
        let err = data.set_thresholds(vec![0.1]).unwrap_err();
        assert!(matches!(err, ModulonError::ThresholdCount { found: 1, expected: 2 }));
    }
}
