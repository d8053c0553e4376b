use criterion::{black_box, criterion_group, criterion_main, Criterion};

use oml::prelude::*;

fn names(items: &[&str]) -> NameSet {
    items.iter().map(|item| (*item).into()).collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    {
        let registry = StaticRegistry::from_yaml(include_str!("../tests/wpf_types.yaml"))
            .expect("registry failed to load");
        let config = CompileConfig {
            assemblies: names(&["CoreLib", "PresentationCore", "PresentationFramework"]),
            namespaces: names(&["System", "System.Windows.Data", "System.Windows.Media"]),
            class_name: "MainWindow".to_string(),
            namespace: "DocumentEditor.App".to_string(),
        };
        let source = include_str!("../tests/main_window.oml");

        c.bench_function("compile main window", |b| {
            b.iter(|| black_box(compile_str(black_box(source), &registry, &config)))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
