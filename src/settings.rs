use crate::network::SegmentClass;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Knobs for a [`Directionalizer`](crate::directionalize::Directionalizer) run.
pub struct FlowSettings {
    /// The lowest-priority segment class. When a sink-less component needs a
    /// synthetic outlet, a dangling segment of this class is preferred.
    pub outlet_class: SegmentClass,
    /// A sink-less component with more non-trivial segments than this is
    /// reported as a likely gap in the input data.
    pub isolated_edge_warning: usize,
    /// Segments at or below this length are not counted as non-trivial.
    pub trivial_length: f64,
    /// Check the final orientation for cycles.
    pub validate: bool,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            outlet_class: SegmentClass(0),
            isolated_edge_warning: 3,
            trivial_length: 0.0,
            validate: true,
        }
    }
}

impl FlowSettings {
    pub fn with_outlet_class(mut self, class: impl Into<SegmentClass>) -> Self {
        self.outlet_class = class.into();
        self
    }

    pub fn with_isolated_edge_warning(mut self, threshold: usize) -> Self {
        self.isolated_edge_warning = threshold;
        self
    }

    pub fn with_trivial_length(mut self, length: f64) -> Self {
        self.trivial_length = length;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub(crate) fn is_trivial(&self, length: f64) -> bool {
        length <= self.trivial_length
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let settings = FlowSettings::default()
            .with_outlet_class(4u16)
            .with_isolated_edge_warning(10)
            .with_trivial_length(0.5)
            .with_validation(false);

        assert_eq!(settings.outlet_class, SegmentClass(4));
        assert_eq!(settings.isolated_edge_warning, 10);
        assert!(settings.is_trivial(0.5));
        assert!(!settings.is_trivial(0.6));
        assert!(!settings.validate);
    }
}
