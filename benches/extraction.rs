use criterion::{Criterion, criterion_group, criterion_main};
use partselect_assistant::crawler::extractor::{clean_page_text, page_text};
use std::fmt::Write;
use std::hint::black_box;

fn product_page() -> String {
    let mut html = String::from(
        "<html><head><title>Door Shelf Bin PS11752778</title>\
         <style>.nav { color: red; }</style><script>var tracking = 1;</script></head><body>",
    );
    for section in 0..40 {
        let _ = write!(
            html,
            "<nav><ul><li><a href=\"/section-{section}\">Section {section}</a></li>\
             <li>★★★★★ Close X</li></ul></nav>\n\t\t<div class=\"pd\">\n\
             <p>This bin attaches to the refrigerator door and holds jars and bottles.</p></div>"
        );
    }
    html.push_str("</body></html>");
    html
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let page = product_page();
    c.bench_function("page_text", |b| b.iter(|| page_text(black_box(&page))));

    let text = page_text(&page);
    c.bench_function("clean_page_text", |b| {
        b.iter(|| clean_page_text(black_box(&text)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
