//! Per-asset path sets shared read-only by every trial.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::info;

use super::gbm::{GbmCalibration, PathSimulator, SimulatedPath};
use crate::data::AssetHistory;
use crate::error::PreconditionError;

/// Paths of one followed asset together with its history.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub history: AssetHistory,
    pub calibration: Option<GbmCalibration>,
    pub paths: Vec<SimulatedPath>,
    /// Historical closes, cached for the volatility window.
    closes: Vec<f64>,
}

impl AssetPaths {
    pub fn new(
        history: AssetHistory,
        calibration: Option<GbmCalibration>,
        paths: Vec<SimulatedPath>,
    ) -> Self {
        let closes = history.closes();
        Self {
            history,
            calibration,
            paths,
            closes,
        }
    }

    pub fn asset(&self) -> &str {
        &self.history.asset
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Rate used to price spreads on this asset (latest observation).
    pub fn risk_free_rate(&self) -> f64 {
        self.history.last_risk_free_rate().unwrap_or(0.0)
    }
}

/// The full set of simulated assets. All assets share path count and length.
#[derive(Debug, Clone)]
pub struct PathUniverse {
    assets: Vec<AssetPaths>,
    num_paths: usize,
    horizon_steps: usize,
}

impl PathUniverse {
    /// Simulate paths for every history. Unseeded builds draw from the OS.
    pub fn build(
        histories: Vec<AssetHistory>,
        simulator: &PathSimulator,
        seed: Option<u64>,
    ) -> Result<Self, PreconditionError> {
        let mut rng = match seed {
            Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
            None => Xoshiro256PlusPlus::from_os_rng(),
        };

        let mut assets = Vec::with_capacity(histories.len());
        for history in histories {
            let (calibration, paths) = simulator.simulate(&history, &mut rng)?;
            info!(
                asset = %history.asset,
                paths = paths.len(),
                mu = calibration.mu,
                sigma = calibration.sigma,
                "Simulated price paths"
            );
            assets.push(AssetPaths::new(history, Some(calibration), paths));
        }
        Self::from_assets(assets)
    }

    /// Assemble a universe from precomputed paths.
    pub fn from_assets(assets: Vec<AssetPaths>) -> Result<Self, PreconditionError> {
        let Some(first) = assets.first() else {
            return Err(PreconditionError::InvalidParameter(
                "at least one asset is required".to_string(),
            ));
        };
        let num_paths = first.paths.len();
        let path_len = first.paths.first().map(|p| p.len()).unwrap_or(0);
        if num_paths == 0 || path_len < 2 {
            return Err(PreconditionError::InvalidParameter(format!(
                "{} has no usable paths",
                first.asset()
            )));
        }

        for asset in &assets {
            let misshapen = |p: &SimulatedPath| {
                p.len() != path_len || p.ma_short.len() != path_len || p.ma_long.len() != path_len
            };
            if asset.paths.len() != num_paths || asset.paths.iter().any(misshapen) {
                return Err(PreconditionError::InvalidParameter(format!(
                    "{} paths do not match the universe shape ({} x {})",
                    asset.asset(),
                    num_paths,
                    path_len
                )));
            }
        }

        Ok(Self {
            assets,
            num_paths,
            horizon_steps: path_len - 1,
        })
    }

    pub fn assets(&self) -> &[AssetPaths] {
        &self.assets
    }

    pub fn get(&self, asset: &str) -> Option<&AssetPaths> {
        self.assets.iter().find(|a| a.asset() == asset)
    }

    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    pub fn horizon_steps(&self) -> usize {
        self.horizon_steps
    }
}
