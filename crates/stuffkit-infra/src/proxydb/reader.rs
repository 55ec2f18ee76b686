//! IP2Proxy BIN database reader
//!
//! Layout (all integers little-endian, file positions 1-based):
//! - header: database type, column count, year, month, day, then the IPv4
//!   row count, IPv4 rows base, IPv6 row count, IPv6 rows base, IPv4 index
//!   base and IPv6 index base as u32
//! - IPv4 rows: `columns` u32 cells; the first is the range start, the others
//!   point at length-prefixed strings. A row's range ends where the next row
//!   begins.
//! - optional index: for every /16 prefix, the first and last row to search

use bytes::Bytes;
use std::net::Ipv4Addr;

use super::ProxyDbError;

const HEADER_LEN: usize = 29;
const MAX_IPV4: u32 = u32::MAX;
/// One (first row, last row) pair per /16 prefix
const IPV4_INDEX_LEN: u64 = 65536 * 8;

/// Column of the country code, by database type (PX1..PX11)
fn country_column(db_type: u8) -> Option<u32> {
    match db_type {
        1 => Some(2),
        2..=11 => Some(3),
        _ => None,
    }
}

/// Column of the proxy type; PX1 has none
fn proxy_type_column(db_type: u8) -> Option<u32> {
    match db_type {
        2..=11 => Some(2),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    pub country_short: String,
    pub proxy_type: String,
}

#[derive(Debug, Clone)]
pub(crate) struct BinDatabase {
    data: Bytes,
    db_type: u8,
    columns: u8,
    date: (u8, u8, u8),
    ipv4_count: u32,
    ipv4_base: u32,
    ipv4_index_base: u32,
}

impl BinDatabase {
    pub(crate) fn parse(data: Bytes) -> Result<Self, ProxyDbError> {
        if data.len() < HEADER_LEN {
            return Err(ProxyDbError::Corrupt("file shorter than header".to_string()));
        }
        let mut db = Self {
            db_type: data[0],
            columns: data[1],
            date: (data[2], data[3], data[4]),
            ipv4_count: 0,
            ipv4_base: 0,
            ipv4_index_base: 0,
            data,
        };
        db.ipv4_count = db.read_u32(6)?;
        db.ipv4_base = db.read_u32(10)?;
        db.ipv4_index_base = db.read_u32(22)?;

        if db.columns < 2 || country_column(db.db_type).is_none() {
            return Err(ProxyDbError::Corrupt(format!(
                "unsupported database type {} with {} columns",
                db.db_type, db.columns
            )));
        }
        db.check_regions()?;
        Ok(db)
    }

    /// The IPv4 rows (plus the row closing the last range) and the index
    /// must lie inside the file.
    fn check_regions(&self) -> Result<(), ProxyDbError> {
        let len = self.data.len() as u64;
        if self.ipv4_base == 0 {
            return Err(ProxyDbError::Corrupt("IPv4 base is 0".to_string()));
        }
        let rows_end = u64::from(self.ipv4_base) - 1
            + (u64::from(self.ipv4_count) + 1) * self.row_size();
        if rows_end > len {
            return Err(ProxyDbError::Corrupt(format!(
                "{} IPv4 rows at {} exceed file size {}",
                self.ipv4_count, self.ipv4_base, len
            )));
        }
        if self.ipv4_index_base > 0 {
            let index_end = u64::from(self.ipv4_index_base) - 1 + IPV4_INDEX_LEN;
            if index_end > len {
                return Err(ProxyDbError::Corrupt(format!(
                    "IPv4 index at {} exceeds file size {}",
                    self.ipv4_index_base, len
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn db_type(&self) -> u8 {
        self.db_type
    }

    /// (year, month, day) of the database build; the year is two-digit
    pub(crate) fn date(&self) -> (u8, u8, u8) {
        self.date
    }

    /// u32 at 1-based `pos`
    fn read_u32(&self, pos: u64) -> Result<u32, ProxyDbError> {
        let start = usize::try_from(pos)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .ok_or_else(|| ProxyDbError::Corrupt(format!("invalid position {}", pos)))?;
        let bytes = self
            .data
            .get(start..start.saturating_add(4))
            .ok_or_else(|| ProxyDbError::Corrupt(format!("read past end at {}", pos)))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Length-prefixed string at 0-based `pos`
    fn read_str(&self, pos: u32) -> Result<String, ProxyDbError> {
        let start = pos as usize;
        let len = *self
            .data
            .get(start)
            .ok_or_else(|| ProxyDbError::Corrupt(format!("string past end at {}", pos)))?
            as usize;
        let bytes = self
            .data
            .get(start + 1..start + 1 + len)
            .ok_or_else(|| ProxyDbError::Corrupt(format!("string past end at {}", pos)))?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn row_size(&self) -> u64 {
        u64::from(self.columns) * 4
    }

    /// Record of the range containing `addr`, if any.
    pub(crate) fn lookup_v4(&self, addr: Ipv4Addr) -> Result<Option<Record>, ProxyDbError> {
        let mut ip = u32::from(addr);
        if ip == MAX_IPV4 {
            ip -= 1;
        }

        let (mut low, mut high) = if self.ipv4_index_base > 0 {
            let entry = u64::from(self.ipv4_index_base) + u64::from(ip >> 16) * 8;
            (
                u64::from(self.read_u32(entry)?),
                u64::from(self.read_u32(entry + 4)?),
            )
        } else {
            (0, u64::from(self.ipv4_count))
        };

        let row_size = self.row_size();
        while low <= high {
            let mid = low + (high - low) / 2;
            let row = u64::from(self.ipv4_base) + mid * row_size;
            let ip_from = self.read_u32(row)?;
            let ip_to = self.read_u32(row + row_size)?;

            if ip >= ip_from && ip < ip_to {
                return self.read_record(row).map(Some);
            }
            if ip < ip_from {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }
        Ok(None)
    }

    fn read_record(&self, row: u64) -> Result<Record, ProxyDbError> {
        let column = |col: u32| -> Result<String, ProxyDbError> {
            let pointer = self.read_u32(row + 4 * u64::from(col - 1))?;
            self.read_str(pointer)
        };

        let country_short = match country_column(self.db_type) {
            Some(col) => column(col)?,
            None => String::new(),
        };
        let proxy_type = match proxy_type_column(self.db_type) {
            Some(col) => column(col)?,
            None => String::new(),
        };
        Ok(Record {
            country_short,
            proxy_type,
        })
    }
}
