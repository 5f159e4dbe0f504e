//! IPv4 packing for DCC host parameters.
//!
//! DCC offers carry the offerer's address as the decimal form of a 32-bit
//! unsigned integer whose most significant byte is the first octet
//! (`127.0.0.1` is `2130706433`).

use std::net::{IpAddr, Ipv4Addr};

use crate::error::AddrError;

/// Pack an IPv4 address into its DCC integer.
#[inline]
pub fn encode_host(addr: Ipv4Addr) -> u32 {
    u32::from_be_bytes(addr.octets())
}

/// Unpack a DCC integer into an IPv4 address.
#[inline]
pub fn decode_host(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_be_bytes())
}

/// Pack any `IpAddr`, failing for IPv6.
pub fn encode_ip(addr: IpAddr) -> Result<u32, AddrError> {
    match addr {
        IpAddr::V4(v4) => Ok(encode_host(v4)),
        IpAddr::V6(_) => Err(AddrError::NotIpv4(addr)),
    }
}

/// Parse the decimal text of a DCC host parameter.
///
/// The value is read into an `i64` so that integers with the top bit set
/// (addresses >= 128.0.0.0) are not mistaken for negative numbers.
pub fn parse_host(text: &str) -> Result<Ipv4Addr, AddrError> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| AddrError::Unparsable(text.to_owned()))?;
    let value = u32::try_from(value).map_err(|_| AddrError::OutOfRange(value))?;
    Ok(decode_host(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_packs_to_known_value() {
        assert_eq!(encode_host(Ipv4Addr::LOCALHOST), 2_130_706_433);
        assert_eq!(decode_host(2_130_706_433), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn high_bit_addresses_survive() {
        let addr = Ipv4Addr::new(192, 168, 1, 10);
        let packed = encode_host(addr);
        assert_eq!(packed, 3_232_235_786);
        assert_eq!(parse_host("3232235786").unwrap(), addr);
        assert_eq!(parse_host("4294967295").unwrap(), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn rejects_bad_text() {
        assert!(matches!(parse_host("abc"), Err(AddrError::Unparsable(_))));
        assert!(matches!(parse_host("-1"), Err(AddrError::OutOfRange(-1))));
        assert!(matches!(
            parse_host("4294967296"),
            Err(AddrError::OutOfRange(4_294_967_296))
        ));
    }

    #[test]
    fn rejects_ipv6() {
        let v6: IpAddr = "::1".parse().unwrap();
        assert!(matches!(encode_ip(v6), Err(AddrError::NotIpv4(_))));
        assert_eq!(encode_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))).unwrap(), 167_772_161);
    }
}
