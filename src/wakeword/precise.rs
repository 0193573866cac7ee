//! Precise-compatible wake-word engine driven as a child process.
//!
//! The engine is started as `<engine> <model> <chunk_size>`.  For every
//! `chunk_size` bytes of 16-bit PCM written to its stdin it prints one
//! probability line on stdout.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::WakewordError;
use crate::config::WakewordConfig;

/// One probability per chunk.
pub trait WakewordEngine: Send {
    /// Bytes the engine expects per call to [`predict`](Self::predict).
    fn chunk_size(&self) -> usize;

    fn predict(&mut self, chunk: &[u8]) -> Result<f32, WakewordError>;
}

// ---------------------------------------------------------------------------
// PreciseEngine
// ---------------------------------------------------------------------------

pub struct PreciseEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    chunk_size: usize,
    line: String,
}

impl PreciseEngine {
    /// Start the engine process.
    pub fn spawn(cfg: &WakewordConfig) -> Result<Self, WakewordError> {
        if cfg.chunk_size == 0 || cfg.chunk_size % 2 != 0 {
            return Err(WakewordError::InvalidChunkSize(cfg.chunk_size));
        }

        log::debug!(
            "wakeword: starting engine {} with model {}",
            cfg.engine_path.display(),
            cfg.model_path.display()
        );

        let mut child = Command::new(&cfg.engine_path)
            .arg(&cfg.model_path)
            .arg(cfg.chunk_size.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| WakewordError::Spawn {
                engine: cfg.engine_path.display().to_string(),
                source: e,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(WakewordError::EngineExited);
        };

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            chunk_size: cfg.chunk_size,
            line: String::new(),
        })
    }
}

impl WakewordEngine for PreciseEngine {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn predict(&mut self, chunk: &[u8]) -> Result<f32, WakewordError> {
        self.stdin.write_all(chunk)?;
        self.stdin.flush()?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(WakewordError::EngineExited);
        }
        parse_probability(&self.line)
    }
}

impl Drop for PreciseEngine {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        log::debug!("wakeword: engine stopped");
    }
}

fn parse_probability(line: &str) -> Result<f32, WakewordError> {
    let trimmed = line.trim();
    trimmed
        .parse::<f32>()
        .map_err(|_| WakewordError::BadPrediction(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn probability_lines() {
        assert_eq!(parse_probability("0.25\n").unwrap(), 0.25);
        assert_eq!(parse_probability("  1\n").unwrap(), 1.0);
        assert!(matches!(
            parse_probability("nan-ish\n"),
            Err(WakewordError::BadPrediction(s)) if s == "nan-ish"
        ));
    }

    #[test]
    fn missing_engine_binary_is_a_spawn_error() {
        let cfg = WakewordConfig {
            engine_path: PathBuf::from("/nonexistent/precise-engine"),
            ..WakewordConfig::default()
        };
        assert!(matches!(
            PreciseEngine::spawn(&cfg),
            Err(WakewordError::Spawn { .. })
        ));
    }

    #[test]
    fn odd_chunk_size_is_rejected_before_spawning() {
        let cfg = WakewordConfig {
            chunk_size: 2047,
            ..WakewordConfig::default()
        };
        assert!(matches!(
            PreciseEngine::spawn(&cfg),
            Err(WakewordError::InvalidChunkSize(2047))
        ));
    }
}
