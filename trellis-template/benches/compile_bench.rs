use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use trellis_template::{CustomAttributeDefinition, CustomElementDefinition, ResourceRegistry, TemplateCompiler};

fn build_rows(count: usize) -> String {
    let mut markup = String::from("<template><ul>");
    for i in 0..count {
        markup.push_str(&format!(
            r#"<li if.bind="show{i}" class="row" click.trigger="pick({i})"><span>${{items[{i}].name}}</span><input value.bind="items[{i}].value"></li>"#
        ));
    }
    markup.push_str("</ul></template>");
    markup
}

fn bench_compile_rows(c: &mut Criterion) {
    let mut resources = ResourceRegistry::new();
    resources.register(CustomAttributeDefinition::builder("if").template_controller().build());

    let mut group = c.benchmark_group("compile_rows");
    group.sample_size(20);
    for &count in &[10usize, 100usize, 500usize] {
        let def = CustomElementDefinition::builder("list").template(&build_rows(count)).build();
        group.bench_with_input(BenchmarkId::from_parameter(count), &def, |b, d| {
            b.iter(|| {
                let compiler = TemplateCompiler::default();
                let _ = compiler.compile(d, &resources, None).expect("compile");
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().without_plots();
    targets = bench_compile_rows
}
criterion_main!(benches);
