use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use wikinorm::markup;

fn generate_wikitext(length: u64) -> String {
    // generate inputs from fixed seeds
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(length); /* define specific algorithm to ensure reproducibility */
    let mut input = String::new();
    for _ in 0..length {
        // mostly readable text, the occasional arbitrary char
        if rng.gen_bool(0.9) {
            input.push(rng.gen_range('a'..='z'));
        } else {
            input.push(rng.gen());
        }
    }

    // sprinkle in the markup the normalizer rewrites
    const VALUES: &[&str] = &[
        " ",
        "\n",
        "'''",
        "''",
        "&lt;",
        "&gt;",
        "[[Link]]",
        "[[Target|label ]]",
        "[[File:Example.png|thumb|caption]]",
        "[[Category:Things]]",
        "{{cite web|url=x}}",
        "<ref>source</ref>",
        "<ref name=\"a\" />",
        "[https://example.org external]",
    ];
    for _ in 0..(length / 10) {
        let mut pos = rng.gen_range(0..input.len());
        while !input.is_char_boundary(pos) {
            pos = rng.gen_range(0..input.len());
        }

        let value = VALUES[rng.gen_range(0..VALUES.len())];
        input.insert_str(pos, value);
    }

    input
}

fn bench_plain_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("plain_text");
    for length in [500u64, 1000u64, 5000u64, 20000u64].into_iter() {
        let input = generate_wikitext(length);
        group.bench_with_input(BenchmarkId::new("Naive", length), &input, |b, i| {
            b.iter(|| markup::plain_text_naive(i));
        });
        group.bench_with_input(BenchmarkId::new("Optimized", length), &input, |b, i| {
            let mut scratch_buffers = (String::new(), String::new());
            b.iter(|| {
                markup::plain_text_optimized(i, (&mut scratch_buffers.0, &mut scratch_buffers.1))
            });
        });
    }
}

fn bench_link_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_extraction");
    for length in [1000u64, 20000u64].into_iter() {
        let input = generate_wikitext(length);
        group.bench_with_input(BenchmarkId::new("Categories", length), &input, |b, i| {
            b.iter(|| markup::categories(i));
        });
        group.bench_with_input(BenchmarkId::new("Links", length), &input, |b, i| {
            b.iter(|| markup::article_links(i));
        });
    }
}

criterion_group!(benches, bench_plain_text, bench_link_extraction);
criterion_main!(benches);
