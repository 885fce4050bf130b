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

//! 48-bit Bluetooth device addresses and the engine's allocator.

use std::collections::VecDeque;
use std::fmt;

use data_encoding::HEXLOWER_PERMISSIVE;
use rand::Rng;
use thiserror::Error;

/// A 48-bit Bluetooth device address, stored in the low bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BluetoothAddress(pub u64);

const ADDRESS_MASK: u64 = 0xffff_ffff_ffff;

/// OUI prefix stamped on allocated addresses.
const ALLOCATED_OUI: u64 = 0xda4c10;

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("invalid bluetooth address: {0}")]
    Invalid(String),
}

impl BluetoothAddress {
    pub fn new(bits: u64) -> BluetoothAddress {
        BluetoothAddress(bits & ADDRESS_MASK)
    }

    /// Parses `aa:bb:cc:dd:ee:ff` (separators optional).
    pub fn parse(text: &str) -> Result<BluetoothAddress, AddressError> {
        let hex: String = text.chars().filter(|c| *c != ':').collect();
        if hex.len() != 12 {
            return Err(AddressError::Invalid(text.to_string()));
        }
        let bytes = HEXLOWER_PERMISSIVE
            .decode(hex.as_bytes())
            .map_err(|_| AddressError::Invalid(text.to_string()))?;
        let mut bits = 0u64;
        for byte in bytes {
            bits = bits << 8 | byte as u64;
        }
        Ok(BluetoothAddress(bits))
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", b[2], b[3], b[4], b[5], b[6], b[7])
    }
}

/// Hands out addresses for chips that attach without one.
///
/// Freed addresses go back in the pool unless address reuse is
/// disabled for the process.
pub struct AddressAllocator {
    next_suffix: u64,
    freed: VecDeque<BluetoothAddress>,
    reuse_disabled: bool,
}

impl AddressAllocator {
    pub fn new(reuse_disabled: bool) -> AddressAllocator {
        // Random starting suffix so instances on one host diverge.
        AddressAllocator {
            next_suffix: rand::thread_rng().gen::<u16>() as u64,
            freed: VecDeque::new(),
            reuse_disabled,
        }
    }

    pub fn allocate(&mut self) -> BluetoothAddress {
        if let Some(address) = self.freed.pop_front() {
            return address;
        }
        let address = BluetoothAddress::new(ALLOCATED_OUI << 24 | (self.next_suffix & 0xff_ffff));
        self.next_suffix += 1;
        address
    }

    pub fn release(&mut self, address: BluetoothAddress) {
        if !self.reuse_disabled {
            self.freed.push_back(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let address = BluetoothAddress::parse("da:4c:10:de:01:02").unwrap();
        assert_eq!(address.to_string(), "da:4c:10:de:01:02");
        assert_eq!(BluetoothAddress::parse("DA4C10DE0102").unwrap(), address);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BluetoothAddress::parse("").is_err());
        assert!(BluetoothAddress::parse("da:4c:10").is_err());
        assert!(BluetoothAddress::parse("zz:zz:zz:zz:zz:zz").is_err());
        assert!(BluetoothAddress::parse("da:4c:10:de:01:02:03").is_err());
    }

    #[test]
    fn test_new_masks_to_48_bits() {
        assert_eq!(BluetoothAddress::new(u64::MAX).0, ADDRESS_MASK);
    }

    #[test]
    fn test_allocator_is_unique_until_release() {
        let mut allocator = AddressAllocator::new(false);
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert_ne!(a, b);
        allocator.release(a);
        assert_eq!(allocator.allocate(), a);
    }

    #[test]
    fn test_allocator_reuse_disabled() {
        let mut allocator = AddressAllocator::new(true);
        let a = allocator.allocate();
        allocator.release(a);
        assert_ne!(allocator.allocate(), a);
    }

    #[test]
    fn test_allocated_addresses_carry_oui() {
        let mut allocator = AddressAllocator::new(false);
        let address = allocator.allocate();
        assert!(address.to_string().starts_with("da:4c:10:"));
    }
}
