//! Helper macros

/// Get the name of the surrounding function
/// 
/// Closures inside the function are stripped, so the name is that of the enclosing item, e.g. `tally_records::item::Item::value`.
#[macro_export]
macro_rules! func_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            core::any::type_name::<T>()
        }
        $crate::strip_func_name(type_name_of(f))
    }};
}

/// Strip the helper suffix and any closure segments from a name produced by [`func_name!`].
#[doc(hidden)]
pub const fn strip_func_name(name: &'static str) -> &'static str {
    let bytes = name.as_bytes();
    let mut end = bytes.len();

    // Remove the trailing `::f`
    if end >= 3 && bytes[end - 3] == b':' && bytes[end - 2] == b':' && bytes[end - 1] == b'f' {
        end -= 3;
    }

    // Remove trailing `::{{closure}}` segments
    const CLOSURE: &[u8] = b"::{{closure}}";
    loop {
        if end < CLOSURE.len() {
            break;
        }
        let mut matches = true;
        let mut i = 0;
        while i < CLOSURE.len() {
            if bytes[end - CLOSURE.len() + i] != CLOSURE[i] {
                matches = false;
                break;
            }
            i += 1;
        }
        if !matches {
            break;
        }
        end -= CLOSURE.len();
    }

    let (head, _) = bytes.split_at(end);
    match core::str::from_utf8(head) {
        Ok(s) => s,
        Err(_) => name,
    }
}
