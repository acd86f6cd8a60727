//! Logical axis to hardware motor mapping.

use crate::error::ScanError;

/// Maps a zero-based logical axis index to a one-based hardware motor number.
///
/// Identity (`index + 1`) unless a reordering table was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisOrderMapping {
    axis_count: usize,
    order: Option<Vec<u32>>,
}

impl AxisOrderMapping {
    /// Identity mapping for `axis_count` axes.
    pub fn identity(axis_count: usize) -> Self {
        Self {
            axis_count,
            order: None,
        }
    }

    /// Build a mapping, checking that a reordering table covers every axis.
    ///
    /// # Errors
    /// `ScanError::Configuration` if `order.len() != axis_count`, an entry is `0`,
    /// or a motor appears twice.
    pub fn new(axis_count: usize, order: Option<Vec<u32>>) -> Result<Self, ScanError> {
        if let Some(order) = &order {
            if order.len() != axis_count {
                return Err(ScanError::Configuration(format!(
                    "axis order has {} entries for {axis_count} axes",
                    order.len()
                )));
            }
            for (i, &motor) in order.iter().enumerate() {
                if motor == 0 {
                    return Err(ScanError::Configuration(
                        "axis order motors are one-based".to_string(),
                    ));
                }
                if order[..i].contains(&motor) {
                    return Err(ScanError::Configuration(format!(
                        "motor {motor} appears twice in axis order"
                    )));
                }
            }
        }
        Ok(Self { axis_count, order })
    }

    /// Number of logical axes.
    pub fn axis_count(&self) -> usize {
        self.axis_count
    }

    /// Hardware motor for logical axis `index`.
    pub fn motor_from_index(&self, index: usize) -> u32 {
        match &self.order {
            Some(order) => order[index],
            None => index as u32 + 1,
        }
    }

    /// `(index, motor)` for every logical axis.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        (0..self.axis_count).map(|i| (i, self.motor_from_index(i)))
    }
}
