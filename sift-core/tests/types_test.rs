//! Tests for the Sift types and interning system.

use lasso::Spur;
use sift_core::types::identifiers::*;
use sift_core::types::interning::{Interner, SymbolInterner};

#[test]
fn test_symbol_interner_basic() {
    let interner = SymbolInterner::new();
    let key = interner.intern("LSource;.get:()Ljava/lang/String;");
    let resolved = interner.resolve(&key);
    assert_eq!(resolved, "LSource;.get:()Ljava/lang/String;");
}

#[test]
fn test_symbol_interner_deduplicates() {
    let interner = SymbolInterner::new();
    let first = interner.intern("input");
    let second = interner.intern("input");
    assert_eq!(first, second);
    assert_eq!(interner.len(), 1);
}

#[test]
fn test_symbol_interner_qualified() {
    let interner = SymbolInterner::new();

    let simple = interner.intern("field");
    let qualified = interner.intern_qualified("LHolder;", "field");

    assert_ne!(simple, qualified);
    assert_eq!(interner.resolve(&simple), "field");
    assert_eq!(interner.resolve(&qualified), "LHolder;.field");
}

#[test]
fn test_id_types_distinct() {
    let interner = SymbolInterner::new();
    let spur = interner.intern("test");

    let method_id = MethodId::new(spur);
    let field_id = FieldId::new(spur);

    // Same underlying Spur, but different types.
    assert_eq!(method_id.inner(), field_id.inner());

    // Type system prevents mixing; we verify both types coexist.
    let _m: MethodId = method_id;
    let _f: FieldId = field_id;
}

#[test]
fn test_id_ordering_follows_interning_order() {
    let interner = SymbolInterner::new();
    let a = KindNameId::new(interner.intern("Alpha"));
    let b = KindNameId::new(interner.intern("Beta"));
    assert!(a < b);
}

#[test]
fn test_value_interner_pointer_equality() {
    let interner: Interner<(String, u32)> = Interner::new();
    let a = interner.intern(("position".to_string(), 10));
    let b = interner.intern(("position".to_string(), 10));
    let c = interner.intern(("position".to_string(), 11));

    assert_eq!(a, b);
    assert_eq!(a.address(), b.address());
    assert_ne!(a, c);
    assert_eq!(interner.len(), 2);
}

#[test]
fn test_value_interner_ordering_by_value() {
    let interner: Interner<u32> = Interner::new();
    let two = interner.intern(2);
    let one = interner.intern(1);
    assert!(one < two);
    assert!(one <= interner.intern(1));
}

#[test]
fn test_concurrent_interning() {
    use rayon::prelude::*;

    let symbols = SymbolInterner::new();
    let values: Interner<u32> = Interner::new();

    // Intern 1000 entries from multiple threads in parallel.
    let names: Vec<String> = (0..1000).map(|i| format!("LClass{};.method:()V", i)).collect();

    let keys: Vec<Spur> = names.par_iter().map(|n| symbols.intern(n)).collect();
    let handles: Vec<_> = (0u32..1000).into_par_iter().map(|i| values.intern(i % 64)).collect();

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(symbols.resolve(key), names[i]);
    }
    assert_eq!(values.len(), 64);
    assert_eq!(handles.len(), 1000);
}
