//! Grid specification: a base design, swept fields, and a replication count.

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::model::{DesignField, DesignParameters};

/// One swept design field and the values it takes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepAxis {
    pub field: DesignField,
    pub values: Vec<f64>,
}

impl SweepAxis {
    pub fn new(field: DesignField, values: Vec<f64>) -> Self {
        Self { field, values }
    }

    /// Evenly spaced values from `min` to `max` inclusive.
    ///
    /// Count fields are rounded to whole numbers and deduplicated.
    pub fn range(field: DesignField, min: f64, max: f64, steps: usize) -> Self {
        let mut values: Vec<f64> = if steps <= 1 {
            vec![min]
        } else {
            let step_size = (max - min) / (steps - 1) as f64;
            (0..steps).map(|i| min + step_size * i as f64).collect()
        };
        if field.is_integer() {
            for v in &mut values {
                *v = v.round();
            }
            values.dedup();
        }
        Self { field, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Complete sweep specification.
///
/// The expanded grid is the cartesian product of all axes in row-major order
/// (last axis varies fastest), each point repeated `replications` times
/// consecutively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    pub base: DesignParameters,
    #[serde(default)]
    pub axes: Vec<SweepAxis>,
    #[serde(default = "default_replications")]
    pub replications: usize,
}

fn default_replications() -> usize {
    100
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            base: DesignParameters::default(),
            axes: Vec::new(),
            replications: default_replications(),
        }
    }
}

impl SweepConfig {
    /// Number of swept dimensions
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Shape of the design grid (values per axis)
    pub fn grid_shape(&self) -> Vec<usize> {
        self.axes.iter().map(SweepAxis::len).collect()
    }

    /// Distinct design points; 1 when nothing is swept
    pub fn total_points(&self) -> usize {
        self.axes.iter().map(SweepAxis::len).product()
    }

    /// Rows in the expanded grid
    pub fn total_rows(&self) -> usize {
        self.total_points() * self.replications
    }

    /// The first swept field, the natural x-axis of a power curve
    pub fn primary_field(&self) -> Option<DesignField> {
        self.axes.first().map(|a| a.field)
    }

    /// Expand into the ordered rows a sweep runs.
    ///
    /// Every row is validated, so configuration errors surface before any
    /// simulation starts.
    pub fn expand(&self) -> Result<Vec<DesignParameters>, SimulationError> {
        let shape = self.grid_shape();
        let mut rows = Vec::with_capacity(self.total_rows());
        for indices in GridIndices::new(&shape) {
            let mut point = self.base;
            for (axis, &idx) in self.axes.iter().zip(&indices) {
                axis.field.apply(&mut point, axis.values[idx])?;
            }
            point.validate()?;
            rows.extend(std::iter::repeat_n(point, self.replications));
        }
        Ok(rows)
    }
}

/// Row-major iterator over all index tuples of a grid shape
struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndices {
    fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            current: vec![0; shape.len()],
            done: shape.contains(&0),
        }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        // Last dimension varies fastest; a 0-d grid yields one empty index
        self.done = true;
        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                self.done = false;
                break;
            }
            self.current[i] = 0;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_values() {
        let axis = SweepAxis::range(DesignField::Effect, 0.0, 50.0, 6);
        assert_eq!(axis.values, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        let single = SweepAxis::range(DesignField::Effect, 7.0, 50.0, 1);
        assert_eq!(single.values, vec![7.0]);
    }

    #[test]
    fn test_integer_range_is_rounded_and_deduped() {
        let axis = SweepAxis::range(DesignField::NSubjects, 2.0, 4.0, 5);
        assert_eq!(axis.values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_no_axes_repeats_base() {
        let config = SweepConfig {
            replications: 3,
            ..Default::default()
        };
        let rows = config.expand().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| *r == config.base));
    }

    #[test]
    fn test_expand_is_row_major_with_consecutive_replications() {
        let config = SweepConfig {
            base: DesignParameters::default(),
            axes: vec![
                SweepAxis::new(DesignField::NSubjects, vec![4.0, 8.0]),
                SweepAxis::new(DesignField::Effect, vec![0.0, 10.0, 20.0]),
            ],
            replications: 2,
        };
        assert_eq!(config.total_points(), 6);
        let rows = config.expand().unwrap();
        assert_eq!(rows.len(), 12);
        let coords: Vec<(usize, f64)> = rows.iter().map(|r| (r.n_subjects, r.effect)).collect();
        assert_eq!(
            coords,
            vec![
                (4, 0.0),
                (4, 0.0),
                (4, 10.0),
                (4, 10.0),
                (4, 20.0),
                (4, 20.0),
                (8, 0.0),
                (8, 0.0),
                (8, 10.0),
                (8, 10.0),
                (8, 20.0),
                (8, 20.0),
            ]
        );
    }

    #[test]
    fn test_empty_axis_gives_empty_grid() {
        let config = SweepConfig {
            axes: vec![SweepAxis::new(DesignField::Effect, vec![])],
            ..Default::default()
        };
        assert!(config.expand().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_axis_value_fails_expansion() {
        let config = SweepConfig {
            axes: vec![SweepAxis::new(DesignField::Rho, vec![0.0, 2.0])],
            ..Default::default()
        };
        assert!(matches!(
            config.expand(),
            Err(SimulationError::InvalidCovariance { .. })
        ));
    }
}
