#[allow(unused_macros)]
#[macro_export]
macro_rules! btreeset {
    () => (
        compile_error!("BTreeSet needs at least 1 element")
    );
    ($e:expr) => ({
        use std::collections::BTreeSet;
        let mut x: BTreeSet<_> = BTreeSet::new();
        assert!(x.insert($e));
        x
    });
    ($e:expr,) => ({
        btreeset!($e)
    });
    ($e:expr, $($item:expr),*) => ({
        use std::collections::BTreeSet;
        let mut x: BTreeSet<_> = BTreeSet::new();
        assert!(x.insert($e));
        $(assert!(x.insert($item));)*
        x
    });
}

/// Parse a DN literal in tests. Panics on a malformed DN.
#[cfg(test)]
macro_rules! dn {
    ($s:expr) => {{
        #[allow(clippy::unwrap_used)]
        let d = <$crate::dn::Dn as std::str::FromStr>::from_str($s).unwrap();
        d
    }};
}

/// Build an entry from a DN and attribute-value pairs in tests.
#[cfg(test)]
macro_rules! entry_init {
    ($dn:expr) => {{
        $crate::entry::Entry::new(dn!($dn))
    }};
    ($dn:expr, $(($attr:expr, $value:expr)),+ $(,)?) => {{
        let mut e = $crate::entry::Entry::new(dn!($dn));
        $(e.add_ava($attr, $value);)+
        e
    }};
}
