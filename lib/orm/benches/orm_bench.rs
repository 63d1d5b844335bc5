use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cuneiform::{Db, FieldDef, SchemaBuilder, Value};
use cuneiform_kv::MemStore;
use cuneiform_sql::SqliteStore;

fn open() -> Db {
    let mut b = SchemaBuilder::new();
    b.model("Town").field(FieldDef::str("name"));
    b.model("Address")
        .field(FieldDef::str("street"))
        .field(FieldDef::record("town", "Town").default(Value::Null));
    b.model("Customer")
        .field(FieldDef::str("name").required())
        .field(FieldDef::record("addr", "Address").default(Value::Null));
    Db::open(
        b.build().unwrap(),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        Arc::new(MemStore::new()),
    )
    .unwrap()
}

fn bench_record_insert(c: &mut Criterion) {
    let db = open();
    let town = db.model("Town").unwrap();

    c.bench_function("record_insert", |b| {
        b.iter(|| {
            let mut t = town.create(vec![("name", "Karlsruhe".into())]).unwrap();
            t.save(&db).unwrap();
            black_box(t.id());
        });
    });
}

fn bench_two_hop_count(c: &mut Criterion) {
    let db = open();
    let town = db.model("Town").unwrap();
    let address = db.model("Address").unwrap();
    let customer = db.model("Customer").unwrap();

    let mut ka = town.create(vec![("name", "Karlsruhe".into())]).unwrap();
    ka.save(&db).unwrap();
    for i in 0..100 {
        let mut a = address
            .create(vec![
                ("street", format!("Street {}", i).into()),
                ("town", (&ka).into()),
            ])
            .unwrap();
        a.save(&db).unwrap();
        let mut firm = customer
            .create(vec![
                ("name", format!("Firma {}", i).into()),
                ("addr", a.into()),
            ])
            .unwrap();
        firm.save(&db).unwrap();
    }

    let in_ka = customer.select().filter(
        customer
            .path(&["addr", "town", "name"])
            .unwrap()
            .eq("Karlsruhe"),
    );
    c.bench_function("two_hop_count", |b| {
        b.iter(|| {
            let n = in_ka.count(&db).unwrap();
            assert_eq!(black_box(n), 100);
        });
    });
}

criterion_group!(benches, bench_record_insert, bench_two_hop_count);
criterion_main!(benches);
