// Run with:  cargo bench --bench set_pixel

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{DrawTarget, Point};
use embedded_graphics::Pixel;
use ledpanel::{Channel, Channels, Color, PixelBuffer, COLS, ROWS};
use std::hint::black_box;

fn set_pixel(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_pixel");
    group.throughput(Throughput::Elements((ROWS * COLS) as u64));

    group.bench_function("single_channel", |b| {
        let mut buffer = PixelBuffer::new();
        b.iter(|| {
            for y in 0..ROWS as i32 {
                for x in 0..COLS as i32 {
                    black_box(&mut buffer).set(black_box(Channel::Red), x, y, true);
                }
            }
        });
    });

    group.bench_function("channel_set", |b| {
        let mut buffer = PixelBuffer::new();
        b.iter(|| {
            for y in 0..ROWS as i32 {
                for x in 0..COLS as i32 {
                    black_box(&mut buffer).set_pixel(x, y, black_box(Channels::ALL), true);
                }
            }
        });
    });

    group.bench_function("draw_target", |b| {
        let mut buffer = PixelBuffer::new();
        b.iter(|| {
            let pixels = (0..ROWS as i32).flat_map(|y| {
                (0..COLS as i32).map(move |x| Pixel(Point::new(x, y), black_box(Color::MAGENTA)))
            });
            black_box(&mut buffer).draw_iter(pixels).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, set_pixel);
criterion_main!(benches);
