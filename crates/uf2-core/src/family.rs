//! UF2 family registry.
//!
//! Compiled-in table of target chip families, generated offline from the
//! upstream `uf2families.json`. Lookup is by case-insensitive short name or
//! by numeric literal.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FamilyError {
    #[error("Family ID needs to be a number or one of: {names}")]
    Unknown { argument: String, names: String },
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// One chip family: 32-bit id, short name and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyEntry {
    pub id: u32,
    pub short_name: &'static str,
    pub description: &'static str,
}

impl FamilyEntry {
    pub const fn new(id: u32, short_name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            short_name,
            description,
        }
    }
}

impl fmt::Display for FamilyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08x} {:<16} {}",
            self.id, self.short_name, self.description
        )
    }
}

/// Known UF2 families.
pub const FAMILIES: &[FamilyEntry] = &[
    FamilyEntry::new(0x16573617, "ATMEGA32", "Microchip (Atmel) ATmega32"),
    FamilyEntry::new(0x1851780a, "SAML21", "Microchip (Atmel) SAML21"),
    FamilyEntry::new(0x1b57745f, "NRF52", "Nordic NRF52"),
    FamilyEntry::new(0x1c5f21b0, "ESP32", "ESP32"),
    FamilyEntry::new(0x1e1f432d, "STM32L1", "ST STM32L1xx"),
    FamilyEntry::new(0x202e3a91, "STM32L0", "ST STM32L0xx"),
    FamilyEntry::new(0x21460ff0, "STM32WL", "ST STM32WLxx"),
    FamilyEntry::new(0x22e0d6fc, "RTL8710B", "Realtek AmebaZ RTL8710B"),
    FamilyEntry::new(0x2abc77ec, "LPC55", "NXP LPC55xx"),
    FamilyEntry::new(0x300f5633, "STM32G0", "ST STM32G0xx"),
    FamilyEntry::new(0x31d228c6, "GD32F350", "GD32F350"),
    FamilyEntry::new(0x3379cfe2, "RTL8720D", "Realtek AmebaD RTL8720D"),
    FamilyEntry::new(0x04240bdf, "STM32L5", "ST STM32L5xx"),
    FamilyEntry::new(0x4c71240a, "STM32G4", "ST STM32G4xx"),
    FamilyEntry::new(0x4fb2d5bd, "MIMXRT10XX", "NXP i.MX RT10XX"),
    FamilyEntry::new(0x51e903a8, "XR809", "Xradiotech 809"),
    FamilyEntry::new(0x53b80f00, "STM32F7", "ST STM32F7xx"),
    FamilyEntry::new(0x55114460, "SAMD51", "Microchip (Atmel) SAMD51"),
    FamilyEntry::new(0x57755a57, "STM32F4", "ST STM32F4xx"),
    FamilyEntry::new(0x5a18069b, "FX2", "Cypress FX2"),
    FamilyEntry::new(0x5d1a0a2e, "STM32F2", "ST STM32F2xx"),
    FamilyEntry::new(0x5ee21072, "STM32F1", "ST STM32F103"),
    FamilyEntry::new(0x621e937a, "NRF52833", "Nordic NRF52833"),
    FamilyEntry::new(0x647824b6, "STM32F0", "ST STM32F0xx"),
    FamilyEntry::new(0x675a40b0, "BK7231U", "Beken 7231U/7231T"),
    FamilyEntry::new(0x68ed2b88, "SAMD21", "Microchip (Atmel) SAMD21"),
    FamilyEntry::new(0x6a82cc42, "BK7251", "Beken 7251/7252"),
    FamilyEntry::new(0x6b846188, "STM32F3", "ST STM32F3xx"),
    FamilyEntry::new(0x6d0922fa, "STM32F407", "ST STM32F407"),
    FamilyEntry::new(0x6db66082, "STM32H7", "ST STM32H7xx"),
    FamilyEntry::new(0x70d16653, "STM32WB", "ST STM32WBxx"),
    FamilyEntry::new(0x7b3ef230, "BK7231N", "Beken 7231N"),
    FamilyEntry::new(0x7eab61ed, "ESP8266", "ESP8266"),
    FamilyEntry::new(0x7f83e793, "KL32L2", "NXP KL32L2x"),
    FamilyEntry::new(0x8fb060fe, "STM32F407VG", "ST STM32F407VG"),
    FamilyEntry::new(0x9fffd543, "RTL8710A", "Realtek Ameba1 RTL8710A"),
    FamilyEntry::new(0xada52840, "NRF52840", "Nordic NRF52840"),
    FamilyEntry::new(0xbfdd4eee, "ESP32S2", "ESP32-S2"),
    FamilyEntry::new(0xc47e5767, "ESP32S3", "ESP32-S3"),
    FamilyEntry::new(0xd42ba06c, "ESP32C3", "ESP32-C3"),
    FamilyEntry::new(0x2b88d29c, "ESP32C2", "ESP32-C2"),
    FamilyEntry::new(0x332726f6, "ESP32H2", "ESP32-H2"),
    FamilyEntry::new(0x540ddf62, "ESP32C6", "ESP32-C6"),
    FamilyEntry::new(0x3d308e94, "ESP32P4", "ESP32-P4"),
    FamilyEntry::new(0xf71c0343, "ESP32C5", "ESP32-C5"),
    FamilyEntry::new(0x77d850c4, "ESP32C61", "ESP32-C61"),
    FamilyEntry::new(0xde1270b7, "BL602", "Boufallo 602"),
    FamilyEntry::new(0xe08f7564, "RTL8720C", "Realtek AmebaZ2 RTL8720C"),
    FamilyEntry::new(0xe48bff56, "RP2040", "Raspberry Pi RP2040"),
    FamilyEntry::new(0xe48bff57, "RP2XXX_ABSOLUTE", "Raspberry Pi Microcontrollers: Absolute (unpartitioned) download"),
    FamilyEntry::new(0xe48bff58, "RP2XXX_DATA", "Raspberry Pi Microcontrollers: Data partition download"),
    FamilyEntry::new(0xe48bff59, "RP2350_ARM_S", "Raspberry Pi RP2350, Secure Arm image"),
    FamilyEntry::new(0xe48bff5a, "RP2350_RISCV", "Raspberry Pi RP2350, RISC-V image"),
    FamilyEntry::new(0xe48bff5b, "RP2350_ARM_NS", "Raspberry Pi RP2350, Non-secure Arm image"),
    FamilyEntry::new(0x00ff6919, "STM32L4", "ST STM32L4xx"),
    FamilyEntry::new(0x9af03e33, "GD32VF103", "GigaDevice GD32VF103"),
    FamilyEntry::new(0x4f6ace52, "CSK4", "LISTENAI CSK300x/400x"),
    FamilyEntry::new(0x6e7348a8, "CSK6", "LISTENAI CSK60xx"),
    FamilyEntry::new(0x11de784a, "M0SENSE", "M0SENSE BL702"),
    FamilyEntry::new(0x4b684d71, "MaixPlay-U4", "Sipeed MaixPlay-U4(BL618)"),
    FamilyEntry::new(0x9517422f, "RZA1LU", "Renesas RZ/A1LU (R7S7210xx)"),
    FamilyEntry::new(0x2dc309c5, "STM32F411xE", "ST STM32F411xE"),
    FamilyEntry::new(0x06d1097b, "STM32F411xC", "ST STM32F411xC"),
    FamilyEntry::new(0x72721d4e, "NRF52832xxAA", "Nordic NRF52832xxAA"),
    FamilyEntry::new(0x6f752678, "NRF52832xxAB", "Nordic NRF52832xxAB"),
    FamilyEntry::new(0xa0c97b8e, "AT32F415", "ArteryTek AT32F415"),
    FamilyEntry::new(0x699b62ec, "CH32V", "WCH CH32V2xx and CH32V3xx"),
    FamilyEntry::new(0x7be8976d, "RA4M1", "Renesas RA4M1"),
];

/// Read-only view over a family table.
#[derive(Debug, Clone, Copy)]
pub struct FamilyRegistry {
    entries: &'static [FamilyEntry],
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FamilyRegistry {
    /// Registry over the compiled-in table.
    pub const fn builtin() -> Self {
        Self { entries: FAMILIES }
    }

    pub fn entries(&self) -> &'static [FamilyEntry] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a family by short name, ignoring case.
    pub fn by_name(&self, name: &str) -> Option<&'static FamilyEntry> {
        self.entries
            .iter()
            .find(|e| e.short_name.eq_ignore_ascii_case(name))
    }

    pub fn by_id(&self, id: u32) -> Option<&'static FamilyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Short name for `id`, if registered.
    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        self.by_id(id).map(|e| e.short_name)
    }

    /// Resolve a `--family` argument: a short name first, then a numeric
    /// literal. Unregistered numeric ids are accepted as-is.
    pub fn resolve(&self, argument: &str) -> Result<u32, FamilyError> {
        let argument = argument.trim();
        if let Some(entry) = self.by_name(argument) {
            return Ok(entry.id);
        }
        parse_u32(argument).map_err(|_| FamilyError::Unknown {
            argument: argument.to_string(),
            names: self.names().join(", "),
        })
    }

    fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.short_name).collect()
    }
}

/// Parse an integer literal with an optional radix prefix
/// (`0x`, `0o`, `0b`, or none for decimal). `_` separators are allowed.
pub fn parse_u32(literal: &str) -> Result<u32, FamilyError> {
    let cleaned: String = literal.trim().chars().filter(|&c| c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };

    // from_str_radix accepts a leading '+', literals don't
    if digits.is_empty() || digits.starts_with('+') {
        return Err(FamilyError::InvalidNumber(literal.to_string()));
    }
    u32::from_str_radix(digits, radix).map_err(|_| FamilyError::InvalidNumber(literal.to_string()))
}
