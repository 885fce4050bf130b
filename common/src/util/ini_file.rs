// Copyright 2024 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Discovery file for netsim clients.
//!
//! The daemon records its bound port in `netsim.ini` so test drivers
//! and tools can find a running instance.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::system::discovery_file_path;

pub struct IniFile {
    data: HashMap<String, String>,
    filepath: PathBuf,
}

impl IniFile {
    pub fn new(filepath: PathBuf) -> IniFile {
        IniFile { data: HashMap::new(), filepath }
    }

    /// Reads key/value pairs from the backing file, replacing any
    /// in-memory data. Lines without `=` are skipped.
    pub fn read(&mut self) -> anyhow::Result<()> {
        self.data.clear();
        let file = File::open(&self.filepath)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some((key, value)) = line.split_once('=') {
                self.data.insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }
        Ok(())
    }

    /// Writes the current key/value pairs to the backing file.
    pub fn write(&self) -> anyhow::Result<()> {
        let mut file = File::create(&self.filepath)?;
        for (key, value) in &self.data {
            writeln!(file, "{}={}", key, value)?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|v| v.as_str())
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_owned(), value.to_owned());
    }
}

/// Writes the discovery file for this instance with the daemon's
/// stream port.
pub fn create_ini(instance: u16, stream_port: u16) -> anyhow::Result<()> {
    let mut ini_file = IniFile::new(discovery_file_path(instance));
    ini_file.insert("stream.port", &stream_port.to_string());
    ini_file.write()
}

/// Removes the discovery file for this instance.
pub fn remove_ini(instance: u16) -> anyhow::Result<()> {
    std::fs::remove_file(discovery_file_path(instance))?;
    Ok(())
}

/// Reads the stream port recorded by a running instance, if any.
pub fn get_stream_port(instance: u16) -> Option<u16> {
    let mut ini_file = IniFile::new(discovery_file_path(instance));
    ini_file.read().ok()?;
    ini_file.get("stream.port")?.parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_ini_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos();
        env::temp_dir().join(format!("netsim-ini-test-{tag}-{nanos}.ini"))
    }

    #[test]
    fn test_write_and_read_back() {
        let path = temp_ini_path("roundtrip");
        let mut ini_file = IniFile::new(path.clone());
        ini_file.insert("stream.port", "7681");
        ini_file.write().unwrap();

        let mut read_back = IniFile::new(path.clone());
        read_back.read().unwrap();
        assert!(read_back.contains("stream.port"));
        assert_eq!(read_back.get("stream.port"), Some("7681"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_read_skips_lines_without_separator() {
        let path = temp_ini_path("skip");
        std::fs::write(&path, "garbage line\nstream.port = 1234\n").unwrap();
        let mut ini_file = IniFile::new(path.clone());
        ini_file.read().unwrap();
        assert_eq!(ini_file.get("stream.port"), Some("1234"));
        assert!(!ini_file.contains("garbage line"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_read_missing_file_fails() {
        let mut ini_file = IniFile::new(temp_ini_path("missing"));
        assert!(ini_file.read().is_err());
    }

    #[test]
    fn test_discovery_file_roundtrip() {
        create_ini(4321, 7681).unwrap();
        assert_eq!(get_stream_port(4321), Some(7681));
        remove_ini(4321).unwrap();
        assert_eq!(get_stream_port(4321), None);
    }
}
