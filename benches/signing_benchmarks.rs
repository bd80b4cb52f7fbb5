use criterion::{black_box, criterion_group, criterion_main, Criterion};
use signed_executor::protocol;
use signed_executor::signing::{SignedToken, TokenSigner};
use signed_executor::transport::RawResult;
use std::time::Duration;

fn benchmark_sign(c: &mut Criterion) {
    let signer = TokenSigner::generate(900).expect("signer");
    c.bench_function("sign_token", |b| {
        b.iter(|| signer.sign(black_box("NS.GET_ZONE_MASTER example.com")))
    });
}

fn benchmark_verify(c: &mut Criterion) {
    let signer = TokenSigner::generate(900).expect("signer");
    let wire = signer.sign("NS.GET_ZONE_MASTER example.com").expect("token");
    let key = signer.verifying_key();
    c.bench_function("decode_and_verify_token", |b| {
        b.iter(|| {
            let token = SignedToken::decode(black_box(&wire)).expect("decode");
            token.verify(&key, token.timestamp)
        })
    });
}

fn benchmark_parse_response(c: &mut Criterion) {
    let raw = RawResult {
        host: "ns1.example.net".to_string(),
        stdout: Some(
            r#"{"status":"OK","code":200,"message":"done","payload":{"zonemaster_ip":"203.0.113.5"}}"#
                .to_string(),
        ),
        stderr: None,
        returncode: Some(0),
        execution_time: Duration::from_millis(8),
    };
    c.bench_function("parse_response", |b| b.iter(|| protocol::parse(black_box(&raw))));
}

criterion_group!(benches, benchmark_sign, benchmark_verify, benchmark_parse_response);
criterion_main!(benches);
