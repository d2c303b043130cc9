use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{
    CENTRAL_TAE_LOCATION, DEFAULT_MAX_HPD_OCCUPANCY, DEFAULT_ZERO_SUPPRESS_HIT_CUT,
};
use super::error::ConfigError;
use super::raw_bank::BankVersion;
use super::smart_id::{RichDetector, RichSmartID};

/// Structure representing the application configuration. Contains pathing, the encode
/// target and the decode policy (integrity checks and suppression).
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub cabling_path: Option<PathBuf>,
    pub bank_version: BankVersion,
    pub zero_suppress_hit_cut: usize,
    pub max_hpd_occupancy: usize,
    pub hot_pixels: Vec<u32>,
    pub check_event_ids: bool,
    pub check_odin_event_ids: bool,
    pub check_odin_bx_ids: bool,
    pub check_board_ids: bool,
    pub check_parity: bool,
    pub check_data_size: bool,
    pub purge_corrupted_pds: bool,
    pub use_fake_pd_id: bool,
    pub decode_rich1: bool,
    pub decode_rich2: bool,
    pub tae_locations: Vec<String>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid, the policy is the
    /// standard one.
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            cabling_path: None,
            bank_version: BankVersion::LHCb5,
            zero_suppress_hit_cut: DEFAULT_ZERO_SUPPRESS_HIT_CUT,
            max_hpd_occupancy: DEFAULT_MAX_HPD_OCCUPANCY,
            hot_pixels: Vec::new(),
            check_event_ids: true,
            check_odin_event_ids: false,
            check_odin_bx_ids: false,
            check_board_ids: false,
            check_parity: true,
            check_data_size: true,
            purge_corrupted_pds: true,
            use_fake_pd_id: false,
            decode_rich1: true,
            decode_rich2: true,
            tae_locations: vec![String::from(CENTRAL_TAE_LOCATION)],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Reject policies that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hpd_occupancy == 0 {
            return Err(ConfigError::ZeroOccupancy);
        }
        if let Some(bad) = self
            .hot_pixels
            .iter()
            .find(|w| !RichSmartID::new(**w).is_valid_pixel())
        {
            return Err(ConfigError::BadHotPixel(*bad));
        }
        Ok(())
    }

    pub fn hot_pixel_ids(&self) -> Vec<RichSmartID> {
        self.hot_pixels.iter().map(|w| RichSmartID::new(*w)).collect()
    }

    pub fn is_detector_enabled(&self, rich: RichDetector) -> bool {
        match rich {
            RichDetector::Rich1 => self.decode_rich1,
            RichDetector::Rich2 => self.decode_rich2,
        }
    }

    /// TAE locations to decode; the central event when none are listed
    pub fn get_tae_locations(&self) -> Vec<String> {
        if self.tae_locations.is_empty() {
            vec![String::from(CENTRAL_TAE_LOCATION)]
        } else {
            self.tae_locations.clone()
        }
    }

    /// Path of the summary written next to the decode output
    pub fn get_summary_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_os_string();
        name.push(".summary.yml");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smart_id::{PdType, PixelAddress, Side};

    #[test]
    fn test_default_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("bank_version: LHCb5"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.zero_suppress_hit_cut, 96);
        assert_eq!(back.max_hpd_occupancy, 200);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = Config {
            max_hpd_occupancy: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroOccupancy)));
        config.max_hpd_occupancy = 10;
        let pixel = RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 0, 0)
            .with_pixel(PixelAddress::new(1, 1));
        config.hot_pixels = vec![pixel.key()];
        assert!(config.validate().is_ok());
        config.hot_pixels.push(0x5);
        assert!(matches!(config.validate(), Err(ConfigError::BadHotPixel(5))));
    }

    #[test]
    fn test_helpers() {
        let config = Config {
            output_path: PathBuf::from("/tmp/hits.txt"),
            decode_rich2: false,
            tae_locations: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.get_summary_path(), PathBuf::from("/tmp/hits.txt.summary.yml"));
        assert!(config.is_detector_enabled(RichDetector::Rich1));
        assert!(!config.is_detector_enabled(RichDetector::Rich2));
        assert_eq!(config.get_tae_locations(), vec![String::from("")]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/not/a/config.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
