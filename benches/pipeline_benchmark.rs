use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use chrono::Duration;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use readmission_risk::{
    Classifier, HospitalRecords, LogisticModel, PipelineConfig, RandomForest, ReadmissionData,
    ReadmissionPipeline,
    metrics::roc_auc,
    records::{Admission, Billing, Patient, parse_timestamp},
};

fn generate_synthetic_data(n_samples: usize, n_features: usize) -> ReadmissionData {
    let mut rng = StdRng::seed_from_u64(42);

    let mut values = Vec::with_capacity(n_samples * n_features);
    for _ in 0..(n_samples * n_features) {
        values.push(rng.gen_range(-2.0..2.0));
    }
    let features = Array2::from_shape_vec((n_samples, n_features), values).unwrap();

    let labels = (0..n_samples)
        .map(|i| {
            let linear_pred = 0.8 * features[[i, 0]] - 0.5 * features[[i, 1 % n_features]] - 1.0;
            rng.r#gen::<f64>() < 1.0 / (1.0 + (-linear_pred).exp())
        })
        .collect();
    let names = (0..n_features).map(|j| format!("x{j}")).collect();

    ReadmissionData::new(features, labels, names).unwrap()
}

fn generate_hospital(n_admissions: usize) -> HospitalRecords {
    let mut rng = StdRng::seed_from_u64(42);
    let mut records = HospitalRecords::default();
    let n_patients = (n_admissions / 2).max(1);
    let start = parse_timestamp("2025-01-01").unwrap();

    for id in 1..=n_patients as u64 {
        records.patients.push(Patient {
            id,
            age: rng.gen_range(18..95),
            gender: if rng.gen_bool(0.5) { "Female" } else { "Male" }.to_string(),
            chronic_conditions: rng.gen_range(0..5),
            admission_type: if rng.gen_bool(0.5) { "Emergency" } else { "OPD" }.to_string(),
        });
    }
    for i in 0..n_admissions {
        let id = i as u64 + 1;
        let stay = rng.gen_range(0..10);
        let admitted_at = start + Duration::days(rng.gen_range(0..365));
        records.admissions.push(Admission {
            id,
            patient_id: (i % n_patients) as u64 + 1,
            admitted_at,
            discharged_at: admitted_at + Duration::days(stay),
            department: ["Cardiology", "Neurology", "Oncology"][rng.gen_range(0..3)].to_string(),
            bed_type: if rng.gen_bool(0.2) { "ICU" } else { "General" }.to_string(),
            readmitted: rng.gen_bool(0.1 + 0.05 * stay as f64),
        });
        records.billing.push(Billing {
            admission_id: id,
            total_charges: rng.gen_range(100.0..10_000.0),
            insurance_covered: rng.gen_bool(0.6),
            claim_status: "Approved".to_string(),
        });
    }
    records
}

fn benchmark_logistic_fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("logistic_fitting");

    for &n_samples in [200, 1000, 5000].iter() {
        for &n_features in [5, 15, 30].iter() {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}x{}", n_samples, n_features)),
                &(n_samples, n_features),
                |b, &(n_samples, n_features)| {
                    let data = generate_synthetic_data(n_samples, n_features);
                    b.iter(|| {
                        let mut model = LogisticModel::new();
                        model.fit(black_box(&data)).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

fn benchmark_forest_fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fitting");
    group.sample_size(10);

    let data = generate_synthetic_data(1000, 15);
    for &n_trees in [50, 200].iter() {
        for &parallel in [false, true].iter() {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}_trees_parallel_{}", n_trees, parallel)),
                &(n_trees, parallel),
                |b, &(n_trees, parallel)| {
                    b.iter(|| {
                        let mut forest = RandomForest::new().with_n_trees(n_trees).with_parallel(parallel);
                        forest.fit(black_box(&data)).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

fn benchmark_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let train_data = generate_synthetic_data(1000, 10);
    let mut logistic = LogisticModel::new();
    logistic.fit(&train_data).unwrap();
    let mut forest = RandomForest::new().with_n_trees(100);
    forest.fit(&train_data).unwrap();

    for &n_samples in [100, 1000, 5000].iter() {
        let test_data = generate_synthetic_data(n_samples, 10);
        group.bench_with_input(
            BenchmarkId::new("logistic", n_samples),
            &n_samples,
            |b, _| b.iter(|| logistic.predict_proba(black_box(&test_data)).unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("forest", n_samples),
            &n_samples,
            |b, _| b.iter(|| forest.predict_proba(black_box(&test_data)).unwrap()),
        );
    }
    group.finish();
}

fn benchmark_roc_auc(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    let data = generate_synthetic_data(5000, 5);
    let mut model = LogisticModel::new();
    model.fit(&data).unwrap();
    let scores = model.predict_proba(&data).unwrap();

    group.bench_function("roc_auc_5000", |b| {
        b.iter(|| roc_auc(black_box(data.labels()), black_box(scores.view())).unwrap());
    });
    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    let mut config = PipelineConfig::default();
    config.forest.n_trees = 100;

    for &n_admissions in [500, 2000].iter() {
        let records = generate_hospital(n_admissions);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_admissions", n_admissions)),
            &n_admissions,
            |b, _| {
                b.iter(|| {
                    ReadmissionPipeline::new(config.clone()).run(black_box(&records)).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_logistic_fitting,
    benchmark_forest_fitting,
    benchmark_prediction,
    benchmark_roc_auc,
    benchmark_pipeline
);
criterion_main!(benches);
