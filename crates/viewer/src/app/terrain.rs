use decals::{MapDims, TerrainView};

/// Synthetic rolling heightfield: crossed sine waves over the map.
pub(crate) struct WaveTerrain {
    dims: MapDims,
    amplitude: f32,
    wavelength: f32,
}

impl WaveTerrain {
    pub(crate) fn new(dims: MapDims, amplitude: f32, wavelength: f32) -> Self {
        Self {
            dims,
            amplitude,
            wavelength: wavelength.max(1.0),
        }
    }
}

impl TerrainView for WaveTerrain {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.amplitude * ((x / self.wavelength).sin() + (z / self.wavelength).cos())
    }

    fn dims(&self) -> MapDims {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_stay_within_twice_the_amplitude() {
        let terrain = WaveTerrain::new(MapDims::new(128, 128), 6.0, 160.0);

        for step in 0..200 {
            let p = step as f32 * 5.11;
            let h = terrain.height_at(p, p * 0.7);
            assert!(h.abs() <= 12.0 + f32::EPSILON);
        }
    }

    #[test]
    fn dims_pass_through() {
        let dims = MapDims::new(64, 32);
        assert_eq!(WaveTerrain::new(dims, 1.0, 10.0).dims(), dims);
    }
}
