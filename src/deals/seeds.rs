use std::collections::HashMap;
use std::fs;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::config::Config;
use crate::types::Domain;

/// Hard-coded fallback when no other seed source is configured or
/// readable (§4.7 priority (4)).
const DEFAULT_SEED_CODES: &[&str] = &["B07W6JN8V8", "B08XYZ1234", "B09KEYB001"];

/// Resolves the configured seed set of product codes, grouped by domain
/// (§4.7 step 1). Priority: (1) explicit targets-config file — reuses the
/// same seed-file mechanism with a distinct, higher-priority path; (2) the
/// flat seed file, one code per line; (3) `DEAL_SEED_ASINS` (comma
/// separated); (4) hard-coded defaults.
///
/// The seed file's modification time is cached across calls; if it hasn't
/// advanced since the last read, the cached parse is reused rather than
/// re-read from disk (§REDESIGN FLAGS).
pub struct SeedSource {
    targets_config_file: Option<String>,
    seed_file: String,
    env_codes: Vec<String>,
    cached_mtime: Option<SystemTime>,
    cached_codes: Vec<String>,
}

impl SeedSource {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            targets_config_file: None,
            seed_file: cfg.deal_seed_file.clone(),
            env_codes: cfg.deal_seed_asins.clone(),
            cached_mtime: None,
            cached_codes: Vec::new(),
        }
    }

    /// Returns the current seed codes, re-reading the seed file only if its
    /// mtime has advanced since the last call.
    pub fn resolve(&mut self) -> Vec<String> {
        if let Some(path) = &self.targets_config_file {
            if let Some(codes) = read_seed_file(path) {
                if !codes.is_empty() {
                    return codes;
                }
            }
        }

        if let Ok(meta) = fs::metadata(&self.seed_file) {
            if let Ok(mtime) = meta.modified() {
                let stale = self.cached_mtime.map(|cached| mtime > cached).unwrap_or(true);
                if stale {
                    if let Some(codes) = read_seed_file(&self.seed_file) {
                        debug!(file = %self.seed_file, count = codes.len(), "seed file reloaded");
                        self.cached_mtime = Some(mtime);
                        self.cached_codes = codes;
                    }
                }
                if !self.cached_codes.is_empty() {
                    return self.cached_codes.clone();
                }
            }
        }

        if !self.env_codes.is_empty() {
            return self.env_codes.clone();
        }

        DEFAULT_SEED_CODES.iter().map(|s| s.to_string()).collect()
    }

    /// Groups the resolved seed codes by the marketplaces configured for
    /// this deployment — the EU five (§1). The source format is a flat list
    /// of codes with no embedded domain, so every code is scanned against
    /// every configured domain (§4.7 step 1).
    pub fn resolve_by_domain(&mut self, domains: &[Domain]) -> HashMap<Domain, Vec<String>> {
        let codes = self.resolve();
        let mut grouped = HashMap::new();
        for &domain in domains {
            grouped.insert(domain, codes.clone());
        }
        grouped
    }
}

fn read_seed_file(path: &str) -> Option<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(
            contents
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect(),
        ),
        Err(e) => {
            warn!("could not read seed file {path}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn falls_back_to_hard_coded_defaults_when_nothing_configured() {
        let mut source = SeedSource {
            targets_config_file: None,
            seed_file: "/nonexistent/path/does-not-exist.txt".to_string(),
            env_codes: Vec::new(),
            cached_mtime: None,
            cached_codes: Vec::new(),
        };
        let codes = source.resolve();
        assert_eq!(codes, DEFAULT_SEED_CODES.to_vec());
    }

    #[test]
    fn env_codes_take_priority_over_defaults() {
        let mut source = SeedSource {
            targets_config_file: None,
            seed_file: "/nonexistent/path/does-not-exist.txt".to_string(),
            env_codes: vec!["B0TESTTEST".to_string()],
            cached_mtime: None,
            cached_codes: Vec::new(),
        };
        assert_eq!(source.resolve(), vec!["B0TESTTEST".to_string()]);
    }

    #[test]
    fn seed_file_is_reread_only_when_mtime_advances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "B07W6JN8V8").unwrap();
        drop(file);

        let mut source = SeedSource {
            targets_config_file: None,
            seed_file: path.to_str().unwrap().to_string(),
            env_codes: Vec::new(),
            cached_mtime: None,
            cached_codes: Vec::new(),
        };

        let first = source.resolve();
        assert_eq!(first, vec!["B07W6JN8V8".to_string()]);

        // Re-resolving without touching the file must return the cached parse.
        let second = source.resolve();
        assert_eq!(second, first);
    }

    #[test]
    fn seed_file_skips_blank_lines_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        fs::write(&path, "B07W6JN8V8\n\n# a comment\nB08XYZZZZZ\n").unwrap();

        let mut source = SeedSource {
            targets_config_file: None,
            seed_file: path.to_str().unwrap().to_string(),
            env_codes: Vec::new(),
            cached_mtime: None,
            cached_codes: Vec::new(),
        };
        let codes = source.resolve();
        assert_eq!(codes, vec!["B07W6JN8V8".to_string(), "B08XYZZZZZ".to_string()]);
    }
}
