use std::ffi::CStr;
use std::net::Ipv4Addr;

/// Lists every `(interface, IPv4 address)` binding on this host via `getifaddrs(3)`.
pub fn ipv4_bindings() -> std::io::Result<Vec<(String, Ipv4Addr)>> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut bindings = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        // SAFETY: `cursor` walks the list returned by getifaddrs, which stays valid until
        // freeifaddrs below.
        let entry = unsafe { &*cursor };
        if !entry.ifa_addr.is_null()
            && i32::from(unsafe { (*entry.ifa_addr).sa_family }) == libc::AF_INET
        {
            let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
            let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            let name = unsafe { CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();
            bindings.push((name, addr));
        }
        cursor = entry.ifa_next;
    }

    unsafe { libc::freeifaddrs(ifap) };
    Ok(bindings)
}

/// Name of the interface carrying `addr`, if any.
pub fn interface_with_address(bindings: &[(String, Ipv4Addr)], addr: Ipv4Addr) -> Option<&str> {
    bindings
        .iter()
        .find(|(_, bound)| *bound == addr)
        .map(|(name, _)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_address() {
        let bindings = vec![
            ("lo".to_owned(), Ipv4Addr::LOCALHOST),
            ("ens3".to_owned(), Ipv4Addr::new(10, 0, 0, 7)),
        ];
        assert_eq!(
            interface_with_address(&bindings, Ipv4Addr::new(10, 0, 0, 7)),
            Some("ens3")
        );
        assert_eq!(
            interface_with_address(&bindings, Ipv4Addr::new(10, 0, 0, 8)),
            None
        );
    }

    #[test]
    fn test_host_bindings_are_listed() {
        let bindings = ipv4_bindings().unwrap();
        assert!(bindings.iter().all(|(name, _)| !name.is_empty()));
    }
}
