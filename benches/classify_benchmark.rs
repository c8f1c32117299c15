use criterion::{Criterion, black_box, criterion_group, criterion_main};
use page_pilot::action::{ActionClassifier, ElementSnapshot, RealisticValues};

/// A form-heavy page worth of element snapshots
fn snapshots() -> Vec<ElementSnapshot> {
    (0..200)
        .map(|i| match i % 8 {
            0 => ElementSnapshot::new("input").attr("type", "text").attr("id", format!("field{}", i)),
            1 => ElementSnapshot::new("input").attr("type", "checkbox").attr("name", format!("opt{}", i)),
            2 => ElementSnapshot::new("textarea").attr("class", "notes wide"),
            3 => ElementSnapshot::new("select").attr("id", format!("choice{}", i)),
            4 => ElementSnapshot::new("a").attr("href", "/next"),
            5 => ElementSnapshot::new("div").attr("role", "button").attr("data-testid", "fab"),
            6 => ElementSnapshot::new("form").attr("id", "main"),
            _ => ElementSnapshot::new("input").attr("type", "submit"),
        })
        .collect()
}

fn benchmark_classify(c: &mut Criterion) {
    let elements = snapshots();
    let sample = ActionClassifier::default();
    let realistic = ActionClassifier::new(Box::new(RealisticValues));

    c.bench_function("classify_200_elements_sample", |b| {
        b.iter(|| {
            elements
                .iter()
                .enumerate()
                .filter_map(|(i, el)| sample.classify(black_box(el), i))
                .count()
        })
    });

    c.bench_function("classify_200_elements_realistic", |b| {
        b.iter(|| {
            elements
                .iter()
                .enumerate()
                .filter_map(|(i, el)| realistic.classify(black_box(el), i))
                .count()
        })
    });
}

criterion_group!(benches, benchmark_classify);
criterion_main!(benches);
