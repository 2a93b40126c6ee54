use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::{merge::MergedTable, records::Doctor};

/// running sum & count for a group mean
#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// charge totals for one group of billed admissions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RevenueStats {
    pub total: f64,
    pub mean: f64,
    pub count: usize,
}

/// operational KPIs - groups w/ no rows simply have no entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HospitalKpis {
    pub daily_admissions: BTreeMap<NaiveDate, usize>,
    pub daily_discharges: BTreeMap<NaiveDate, usize>,
    /// bed type -> % of admissions
    pub bed_utilisation: BTreeMap<String, f64>,
    pub avg_length_of_stay: Option<f64>,
    pub avg_length_of_stay_by_department: BTreeMap<String, f64>,
    pub avg_patients_per_doctor: Option<f64>,
    pub avg_patients_per_doctor_by_department: BTreeMap<String, f64>,
    /// sum of charges over admissions w/ a billing record
    pub revenue_by_department: BTreeMap<String, f64>,
    pub revenue_by_bed_type: BTreeMap<String, RevenueStats>,
    /// claim status -> % of billed admissions
    pub claim_status: BTreeMap<String, f64>,
    pub readmission_rate: Option<f64>,
    pub readmission_rate_by_department: BTreeMap<String, f64>,
}

impl HospitalKpis {
    pub fn compute(table: &MergedTable, doctors: &[Doctor]) -> Self {
        let mut kpis = Self::default();

        let mut beds: BTreeMap<String, usize> = BTreeMap::new();
        let mut claims: BTreeMap<String, usize> = BTreeMap::new();
        let mut los = Mean::default();
        let mut los_by_dept: BTreeMap<String, Mean> = BTreeMap::new();
        let mut readmit = Mean::default();
        let mut readmit_by_dept: BTreeMap<String, Mean> = BTreeMap::new();
        let mut bed_revenue: BTreeMap<String, Mean> = BTreeMap::new();

        for row in table.iter() {
            *kpis.daily_admissions.entry(row.admitted_at.date()).or_default() += 1;
            *kpis.daily_discharges.entry(row.discharged_at.date()).or_default() += 1;
            *beds.entry(row.bed_type.clone()).or_default() += 1;

            let stay = row.length_of_stay as f64;
            los.add(stay);
            los_by_dept.entry(row.department.clone()).or_default().add(stay);

            let flag = if row.readmitted { 1.0 } else { 0.0 };
            readmit.add(flag);
            readmit_by_dept.entry(row.department.clone()).or_default().add(flag);

            if let Some(billing) = &row.billing {
                *kpis.revenue_by_department.entry(row.department.clone()).or_default() += billing.total_charges;
                *claims.entry(billing.claim_status.clone()).or_default() += 1;
                bed_revenue.entry(row.bed_type.clone()).or_default().add(billing.total_charges);
            }
        }

        kpis.bed_utilisation = percentages(beds);
        kpis.claim_status = percentages(claims);
        kpis.avg_length_of_stay = los.value();
        kpis.avg_length_of_stay_by_department = means(los_by_dept);
        kpis.readmission_rate = readmit.value();
        kpis.readmission_rate_by_department = means(readmit_by_dept);
        kpis.revenue_by_bed_type = bed_revenue
            .into_iter()
            .filter_map(|(bed, charges)| {
                charges.value().map(|mean| {
                    (bed, RevenueStats { total: charges.sum, mean, count: charges.count })
                })
            })
            .collect();

        let mut workload = Mean::default();
        let mut workload_by_dept: BTreeMap<String, Mean> = BTreeMap::new();
        for doctor in doctors {
            let handled = doctor.patients_handled as f64;
            workload.add(handled);
            workload_by_dept.entry(doctor.department.clone()).or_default().add(handled);
        }
        kpis.avg_patients_per_doctor = workload.value();
        kpis.avg_patients_per_doctor_by_department = means(workload_by_dept);

        log::info!(
            "kpis over {} admissions across {} days, {} doctors",
            table.len(),
            kpis.daily_admissions.len(),
            doctors.len()
        );
        kpis
    }

    pub fn print(&self) {
        print!("{self}");
    }
}

fn percentages(counts: BTreeMap<String, usize>) -> BTreeMap<String, f64> {
    let total: usize = counts.values().sum();
    counts
        .into_iter()
        .map(|(key, count)| (key, 100.0 * count as f64 / total as f64))
        .collect()
}

fn means(groups: BTreeMap<String, Mean>) -> BTreeMap<String, f64> {
    groups
        .into_iter()
        .filter_map(|(key, mean)| mean.value().map(|v| (key, v)))
        .collect()
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, values: &BTreeMap<String, f64>) -> fmt::Result {
    writeln!(f, "{title}")?;
    for (key, value) in values {
        writeln!(f, "  {:<20} {:>14.2}", key, value)?;
    }
    writeln!(f)
}

fn write_optional(f: &mut fmt::Formatter<'_>, label: &str, value: Option<f64>) -> fmt::Result {
    match value {
        Some(v) => writeln!(f, "{:<22} {:>14.2}", label, v),
        None => writeln!(f, "{:<22} {:>14}", label, "n/a"),
    }
}

impl fmt::Display for HospitalKpis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hospital KPIs")?;
        writeln!(f, "=============")?;
        write_optional(f, "Avg length of stay", self.avg_length_of_stay)?;
        write_optional(f, "Avg patients/doctor", self.avg_patients_per_doctor)?;
        write_optional(f, "Readmission rate", self.readmission_rate)?;
        writeln!(f)?;

        write_section(f, "Bed utilisation (%)", &self.bed_utilisation)?;
        write_section(f, "Claim status (%)", &self.claim_status)?;
        write_section(f, "Avg length of stay by department", &self.avg_length_of_stay_by_department)?;
        write_section(f, "Avg patients per doctor by department", &self.avg_patients_per_doctor_by_department)?;
        write_section(f, "Revenue by department", &self.revenue_by_department)?;
        write_section(f, "Readmission rate by department", &self.readmission_rate_by_department)?;

        writeln!(f, "{:<12} {:>14} {:>12} {:>8}", "bed type", "revenue", "mean", "count")?;
        for (bed, stats) in &self.revenue_by_bed_type {
            writeln!(f, "{:<12} {:>14.2} {:>12.2} {:>8}", bed, stats.total, stats.mean, stats.count)?;
        }
        writeln!(f)?;

        writeln!(f, "{:<12} {:>10} {:>10}", "date", "admitted", "discharged")?;
        let dates: std::collections::BTreeSet<&NaiveDate> =
            self.daily_admissions.keys().chain(self.daily_discharges.keys()).collect();
        for date in dates {
            writeln!(
                f,
                "{:<12} {:>10} {:>10}",
                date.to_string(),
                self.daily_admissions.get(date).copied().unwrap_or(0),
                self.daily_discharges.get(date).copied().unwrap_or(0)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{BillingFields, MergedObservation};
    use crate::records::parse_timestamp;
    use approx::assert_relative_eq;

    fn row(id: u64, admitted: &str, discharged: &str, department: &str, bed: &str, readmitted: bool, charges: Option<(f64, &str)>) -> MergedObservation {
        let admitted_at = parse_timestamp(admitted).unwrap();
        let discharged_at = parse_timestamp(discharged).unwrap();
        MergedObservation {
            admission_id: id,
            patient_id: id,
            admitted_at,
            discharged_at,
            department: department.to_string(),
            bed_type: bed.to_string(),
            readmitted,
            length_of_stay: (discharged_at - admitted_at).num_days(),
            patient: None,
            billing: charges.map(|(total_charges, status)| BillingFields {
                total_charges,
                insurance_covered: true,
                claim_status: status.to_string(),
            }),
        }
    }

    fn doctor(id: u64, department: &str, handled: u32) -> Doctor {
        Doctor {
            id,
            department: department.to_string(),
            patients_handled: handled,
            avg_consult_time: 15.0,
        }
    }

    fn table() -> MergedTable {
        MergedTable::from_rows(vec![
            row(1, "2025-01-01", "2025-01-03", "Cardiology", "ICU", true, Some((1000.0, "Approved"))),
            row(2, "2025-01-01", "2025-01-02", "Cardiology", "General", false, Some((500.0, "Rejected"))),
            row(3, "2025-01-02", "2025-01-02", "Neurology", "General", false, None),
            row(4, "2025-01-03", "2025-01-07", "Neurology", "General", true, Some((250.0, "Approved"))),
        ])
        .unwrap()
    }

    #[test]
    fn test_daily_counts() {
        let kpis = HospitalKpis::compute(&table(), &[]);
        let admitted: Vec<usize> = kpis.daily_admissions.values().copied().collect();
        assert_eq!(admitted, vec![2, 1, 1]);
        assert_eq!(kpis.daily_admissions.values().sum::<usize>(), 4);
        assert_eq!(kpis.daily_discharges.values().sum::<usize>(), 4);
        assert!(kpis.daily_admissions.keys().zip(kpis.daily_admissions.keys().skip(1)).all(|(a, b)| a < b));
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let kpis = HospitalKpis::compute(&table(), &[]);
        assert_relative_eq!(kpis.bed_utilisation["General"], 75.0);
        assert_relative_eq!(kpis.bed_utilisation.values().sum::<f64>(), 100.0, epsilon = 1e-9);

        // claim share is over billed admissions only
        assert_relative_eq!(kpis.claim_status["Approved"], 200.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(kpis.claim_status.values().sum::<f64>(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_los_revenue_and_readmission() {
        let kpis = HospitalKpis::compute(&table(), &[]);
        assert_relative_eq!(kpis.avg_length_of_stay.unwrap(), 7.0 / 4.0);
        assert_relative_eq!(kpis.avg_length_of_stay_by_department["Cardiology"], 1.5);
        assert_relative_eq!(kpis.avg_length_of_stay_by_department["Neurology"], 2.0);
        assert_relative_eq!(kpis.revenue_by_department["Cardiology"], 1500.0);
        assert_relative_eq!(kpis.revenue_by_department["Neurology"], 250.0);
        assert_relative_eq!(kpis.readmission_rate.unwrap(), 0.5);
        assert_relative_eq!(kpis.readmission_rate_by_department["Neurology"], 0.5);
    }

    #[test]
    fn test_revenue_by_bed_type() {
        let kpis = HospitalKpis::compute(&table(), &[]);
        assert_eq!(kpis.revenue_by_bed_type.len(), 2);

        let icu = kpis.revenue_by_bed_type["ICU"];
        assert_relative_eq!(icu.total, 1000.0);
        assert_relative_eq!(icu.mean, 1000.0);
        assert_eq!(icu.count, 1);

        // the unbilled general stay isn't counted
        let general = kpis.revenue_by_bed_type["General"];
        assert_relative_eq!(general.total, 750.0);
        assert_relative_eq!(general.mean, 375.0);
        assert_eq!(general.count, 2);
    }

    #[test]
    fn test_doctor_workload() {
        let doctors = vec![
            doctor(1, "Cardiology", 10),
            doctor(2, "Cardiology", 20),
            doctor(3, "Oncology", 6),
        ];
        let kpis = HospitalKpis::compute(&table(), &doctors);
        assert_relative_eq!(kpis.avg_patients_per_doctor.unwrap(), 12.0);
        assert_relative_eq!(kpis.avg_patients_per_doctor_by_department["Cardiology"], 15.0);
        assert_relative_eq!(kpis.avg_patients_per_doctor_by_department["Oncology"], 6.0);
    }

    #[test]
    fn test_empty_inputs() {
        let kpis = HospitalKpis::compute(&MergedTable::default(), &[]);
        assert!(kpis.avg_length_of_stay.is_none());
        assert!(kpis.avg_patients_per_doctor.is_none());
        assert!(kpis.readmission_rate.is_none());
        assert!(kpis.bed_utilisation.is_empty());
        assert!(kpis.claim_status.is_empty());
        assert!(kpis.revenue_by_bed_type.is_empty());
        assert!(kpis.to_string().contains("n/a"));
    }
}
