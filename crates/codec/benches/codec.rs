use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use radius_server_codec::{Code, Dictionary, Packet};

fn criterion_benchmark(c: &mut Criterion) {
    let dict = Arc::new(Dictionary::default());

    let encoded = Packet::new(dict.clone(), Code::AccessRequest, 1)
        .with_attribute(dict.attribute("User-Name", "bench").unwrap())
        .with_attribute(dict.attribute("User-Password", "password").unwrap())
        .with_attribute(dict.attribute("NAS-IP-Address", "127.0.0.1").unwrap())
        .encode_request("testing123")
        .unwrap();
    let bytes = encoded.to_bytes().unwrap();

    c.bench_function("decode_access_request", |b| {
        b.iter(|| Packet::decode_request(&bytes, dict.clone(), "testing123").unwrap())
    });

    c.bench_function("encode_access_request", |b| {
        b.iter(|| {
            encoded
                .clone()
                .encode_request("testing123")
                .unwrap()
                .to_bytes()
                .unwrap()
        })
    });

    c.bench_function("parse_only", |b| {
        b.iter(|| Packet::decode(&bytes, dict.clone()).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
