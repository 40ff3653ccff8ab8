use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use hierodec::settings::{parse_settings_toml, DEFAULT_SETTINGS_TOML};
use hierodec::{Decoder, DecoderConfig};

const GRAMMAR: &str = "\
[X] ||| a ||| A ||| -1 ||| 0-0
[X] ||| b ||| B ||| -1 ||| 0-0
[X] ||| c ||| C ||| -1 ||| 0-0
[X] ||| a b ||| AB ||| -1.5 ||| 0-0 1-0
[X] ||| b c ||| BC ||| -1.4 ||| 0-0 1-0
[X] ||| [X,1] c ||| [X,1] C2 ||| -0.7 ||| 1-1
[X] ||| a [X,1] ||| A2 [X,1] ||| -0.8 ||| 0-0
";

fn decoder(kbest: usize) -> Decoder {
    let mut toml = DEFAULT_SETTINGS_TOML.to_string();
    toml.push_str("\"tm_0\" = 1.0\n\"glue_0\" = 1.0\n");
    let mut settings = parse_settings_toml(&toml).unwrap();
    settings.output.kbest = kbest;
    Decoder::new(DecoderConfig::new(settings, &[("tm", GRAMMAR)]).unwrap())
}

fn bench_decode(c: &mut Criterion) {
    let short = "a b c";
    let long = "a b c a b c a b c a b c";

    let viterbi = decoder(1);
    c.bench_function("decode_viterbi_short", |b| {
        b.iter(|| black_box(viterbi.decode(0, black_box(short))))
    });
    c.bench_function("decode_viterbi_long", |b| {
        b.iter(|| black_box(viterbi.decode(0, black_box(long))))
    });

    let kbest = decoder(50);
    c.bench_function("decode_kbest50_long", |b| {
        b.iter(|| black_box(kbest.decode(0, black_box(long))))
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
