//! Minimum and maximum pixel values of a raster band.

use crate::error::{Error, Result};

/// Single raster band held in memory, row-major.
#[derive(Clone, Debug)]
pub struct Band {
    width: usize,
    height: usize,
    values: Vec<f64>,
    no_data: Option<f64>,
}

impl Band {
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        if width.checked_mul(height) != Some(values.len()) {
            return Err(Error::InvalidArgument(format!(
                "{} pixel values for a {width} x {height} band",
                values.len()
            )));
        }
        Ok(Band {
            width,
            height,
            values,
            no_data: None,
        })
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }
}

/// `(min, max)` of the band's pixels, ignoring no-data and NaN values.
pub fn extrema(band: &Band) -> Option<(f64, f64)> {
    band.values
        .iter()
        .copied()
        .filter(|v| !v.is_nan() && band.no_data.map_or(true, |nd| v.to_bits() != nd.to_bits()))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max() -> Result<()> {
        let band = Band::new(3, 2, vec![4.0, -9999.0, 2.5, 7.0, f64::NAN, 3.0])?;
        assert_eq!(extrema(&band), Some((-9999.0, 7.0)));
        let band = band.with_no_data(-9999.0);
        assert_eq!(extrema(&band), Some((2.5, 7.0)));
        assert_eq!(band.value(0, 1), Some(7.0));
        assert_eq!(band.value(3, 0), None);
        Ok(())
    }

    #[test]
    fn no_pixels() -> Result<()> {
        let band = Band::new(2, 1, vec![0.0, 0.0])?.with_no_data(0.0);
        assert_eq!(extrema(&band), None);
        assert!(Band::new(2, 2, vec![1.0]).is_err());
        Ok(())
    }
}
