//! API Configuration Module
//!
//! Server settings come from environment variables with development
//! defaults; the DataTable configuration itself is a TOML file.

use std::net::SocketAddr;
use std::path::PathBuf;

use datatable_core::{DataResult, DataTableConfig};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// TOML file with the DataTable configuration. Absent means defaults.
    pub config_path: Option<PathBuf>,

    /// Host to bind to.
    pub bind_host: String,

    /// Port to bind to, unparsed.
    pub port: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            bind_host: "0.0.0.0".to_string(),
            port: "3000".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DATATABLE_CONFIG`: path of the TOML configuration file
    /// - `DATATABLE_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT`, then `DATATABLE_PORT`: bind port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            config_path: std::env::var("DATATABLE_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            bind_host: std::env::var("DATATABLE_BIND").unwrap_or(defaults.bind_host),
            port: std::env::var("PORT")
                .ok()
                .or_else(|| std::env::var("DATATABLE_PORT").ok())
                .unwrap_or(defaults.port),
        }
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self.port.trim().parse::<u16>().map_err(|_| {
            ApiError::invalid_input(format!("Invalid port value: {}", self.port))
        })?;
        let addr = format!("{}:{}", self.bind_host, port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Load and validate the DataTable configuration.
    pub fn load_datatable_config(&self) -> DataResult<DataTableConfig> {
        let config = match &self.config_path {
            Some(path) => DataTableConfig::from_file(path)?,
            None => DataTableConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig {
            bind_host: "127.0.0.1".to_string(),
            port: "8080".to_string(),
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8080");

        let bad = ApiConfig {
            port: "eighty".to_string(),
            ..Default::default()
        };
        assert_eq!(bad.bind_addr().unwrap_err().code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_loads_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("datatable.toml");
        std::fs::write(&path, "data_slots = 3\n[tables.Employees]\ncolumns = [\"Name\"]\n").unwrap();

        let config = ApiConfig {
            config_path: Some(path),
            ..Default::default()
        }
        .load_datatable_config()
        .unwrap();
        assert_eq!(config.data_slots, 3);
        assert!(config.tables.contains_key("Employees"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let config = ApiConfig {
            config_path: Some(PathBuf::from("/nonexistent/datatable.toml")),
            ..Default::default()
        };
        assert!(config.load_datatable_config().is_err());
    }
}
