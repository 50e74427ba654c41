// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for per-community game data.
    pub data_dir: PathBuf,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Preferred TrueType font for sheet rendering. When unset (or
    /// unreadable) the renderer probes well-known locations and finally
    /// falls back to its built-in bitmap font.
    pub font_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `BINGO_DATA_DIR` - Root data directory (default: `./data`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `BINGO_FONT_PATH` - TrueType font file for sheet rendering
    ///
    /// CLI flags:
    /// - `--data-dir <DIR>` - Override the data directory
    /// - `--port <PORT>` - Override the port
    /// - `--font <FILE>` - Override the font file
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let data_dir = Self::parse_cli_value(&args, "--data-dir")
            .map(PathBuf::from)
            .or_else(|| std::env::var("BINGO_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./data"));

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let font_path = Self::parse_cli_value(&args, "--font")
            .map(PathBuf::from)
            .or_else(|| std::env::var("BINGO_FONT_PATH").ok().map(PathBuf::from));

        Config {
            data_dir,
            port,
            font_path,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_value() {
        let args: Vec<String> = ["bingo-backend", "--port", "8080", "--font", "face.ttf"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            Config::parse_cli_value(&args, "--port"),
            Some("8080".to_string())
        );
        assert_eq!(
            Config::parse_cli_value(&args, "--font"),
            Some("face.ttf".to_string())
        );
        assert_eq!(Config::parse_cli_value(&args, "--data-dir"), None);
    }
}
