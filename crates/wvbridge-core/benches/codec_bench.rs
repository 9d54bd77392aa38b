// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for envelope encoding, decoding and outbound script
// construction in the wvbridge-core crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use wvbridge_core::Envelope;
use wvbridge_core::codec::{decode, encode, outbound_script};

const ENTRY_POINT: &str = "WebViewJavascriptBridge._handleMessageFromJava";

/// A request with a moderately nested payload, typical of form submissions.
fn sample_request() -> Envelope {
    Envelope::request(
        "saveDocument",
        json!({
            "title": "Quarterly report",
            "pages": 12,
            "tags": ["finance", "q3", "draft"],
            "author": {"name": "A. Writer", "id": 4711},
        }),
        Some("native_cb_1024".into()),
    )
}

fn bench_encode(c: &mut Criterion) {
    let env = sample_request();
    c.bench_function("encode_request", |b| b.iter(|| encode(black_box(&env))));
}

fn bench_decode(c: &mut Criterion) {
    let text = encode(&sample_request());
    c.bench_function("decode_request", |b| b.iter(|| decode(black_box(&text))));

    let response = r#"{"responseId":"native_cb_1024","responseData":{"ok":true}}"#;
    c.bench_function("decode_response", |b| b.iter(|| decode(black_box(response))));

    c.bench_function("decode_malformed", |b| {
        b.iter(|| decode(black_box("not valid json")))
    });
}

fn bench_outbound_script(c: &mut Criterion) {
    let env = sample_request();
    c.bench_function("outbound_script", |b| {
        b.iter(|| outbound_script(black_box(ENTRY_POINT), black_box(&env)))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_outbound_script);
criterion_main!(benches);
