use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tiffout::Endian;
use tiffout::formats::tiff::{OutputSet, Rational, RebuildHeader, generate, layout, validate, write};
use tiffout::tags::{ExifTag, TiffTag};

/// A chain of `n` root directories, each with an Exif sub-directory and strips
fn generate_set(n: usize) -> OutputSet {
  let mut set = OutputSet::new();
  let mut prev = set.root();
  for i in 0..n {
    let dir = if i == 0 { prev } else { set.add_chained_directory(prev).unwrap() };
    set[dir].add(TiffTag::ImageWidth, 256_u32).unwrap();
    set[dir].add(TiffTag::ImageLength, 64_u32).unwrap();
    set[dir].add(TiffTag::Software, "tiffout benchmark").unwrap();
    set[dir].add(TiffTag::XResolution, Rational::new(300, 1)).unwrap();
    set[dir].set_strips((0..64).map(|s| vec![s as u8; 257]).collect()).unwrap();
    let exif = set.add_sub_directory(dir, TiffTag::ExifIFDPointer).unwrap();
    set[exif].add(ExifTag::ExposureTime, Rational::new(1, 60)).unwrap();
    set[exif].add(ExifTag::LensModel, "smc PENTAX-FA 43mm F1.9 Limited").unwrap();
    prev = dir;
  }
  set
}

fn layout_set(set: &OutputSet) {
  let mut summary = validate(set).unwrap();
  let mut items = generate(set, Endian::Little).unwrap();
  layout(&mut items, &mut summary, 8).unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
  let mut group = c.benchmark_group("tiff-layout");
  group.significance_level(0.1).sample_size(20);

  let set = generate_set(200);

  group.bench_with_input("layout_200_ifds", &set, |b, set| b.iter(|| layout_set(black_box(set))));

  group.bench_with_input("write_200_ifds", &set, |b, set| {
    b.iter(|| {
      let mut out = Vec::new();
      write(&mut out, black_box(set), &RebuildHeader, Endian::Big).unwrap();
      out
    })
  });

  group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
