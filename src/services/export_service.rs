use crate::dto::report_dto::LeaderboardEntry;
use crate::error::Result;
use crate::models::module::TrainingModule;
use rust_xlsxwriter::*;

pub struct ExportService;

impl ExportService {
    /// Styled XLSX workbook of a module leaderboard, one row per ranked student.
    pub fn leaderboard_xlsx(module: &TrainingModule, board: &[LeaderboardEntry]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Leaderboard")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let header_text = Color::White;
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);

        let score_high = Color::RGB(0x10B981);
        let score_mid = Color::RGB(0xF59E0B);
        let score_low = Color::RGB(0xEF4444);

        let columns = [
            ("Rank", 8.0),
            ("Reg No", 16.0),
            ("Name", 30.0),
            ("Department", 14.0),
            ("Batch", 14.0),
            ("Average Score", 16.0),
            ("Attendance %", 14.0),
            ("Present", 10.0),
            ("Absent", 10.0),
            ("On Duty", 10.0),
            ("Partial", 10.0),
            ("Days Recorded", 14.0),
        ];
        let last_col = (columns.len() - 1) as u16;

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(header_text)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(0, 40)?;
        worksheet.merge_range(0, 0, 0, last_col, &format!("{} Leaderboard", module.title), &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(1, 22)?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let subtitle_text = format!(
            "Exported {}  •  {} students  •  {} exams",
            now,
            board.len(),
            module.exams_count
        );
        worksheet.merge_range(1, 0, 1, last_col, &subtitle_text, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(header_text)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let header_row = 2;
        worksheet.set_row_height(header_row, 30)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        for (idx, entry) in board.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let name_fmt = base_fmt.clone().set_bold();

            worksheet.set_row_height(row, 22)?;
            worksheet.write_number_with_format(row, 0, entry.rank as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &entry.student.reg_no, &center_fmt)?;
            worksheet.write_string_with_format(row, 2, &entry.student.name, &name_fmt)?;
            worksheet.write_string_with_format(row, 3, &entry.student.department, &center_fmt)?;
            worksheet.write_string_with_format(row, 4, &entry.student.batch, &center_fmt)?;

            let score_color = if entry.average_score >= 70.0 {
                score_high
            } else if entry.average_score >= 40.0 {
                score_mid
            } else {
                score_low
            };
            let score_fmt = Format::new()
                .set_font_size(11)
                .set_bold()
                .set_font_color(score_color)
                .set_background_color(bg)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color)
                .set_num_format("0.00");
            worksheet.write_number_with_format(row, 5, entry.average_score, &score_fmt)?;

            let attendance = &entry.attendance;
            worksheet.write_number_with_format(row, 6, attendance.percentage as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 7, attendance.present as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 8, attendance.absent as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 9, attendance.on_duty as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 10, attendance.partial as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 11, attendance.total as f64, &center_fmt)?;
        }

        let total_row = data_start_row + board.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let class_average = if board.is_empty() {
            0.0
        } else {
            board.iter().map(|e| e.average_score).sum::<f64>() / board.len() as f64
        };
        let full_attendance = board.iter().filter(|e| e.attendance.total > 0 && e.attendance.percentage == 100).count();

        worksheet.set_row_height(total_row, 26)?;
        worksheet.merge_range(total_row, 0, total_row, 4, &format!("Total: {} students", board.len()), &summary_fmt)?;
        worksheet.merge_range(
            total_row,
            5,
            total_row,
            last_col,
            &format!("Class average: {:.2} | Full attendance: {}", class_average, full_attendance),
            &summary_fmt,
        )?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(2, 0, (data_start_row + board.len() as u32).saturating_sub(1).max(2), last_col)?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::StudentSummary;
    use crate::services::reconciliation::AttendanceSummary;
    use chrono::Utc;
    use uuid::Uuid;

    fn module() -> TrainingModule {
        TrainingModule {
            id: Uuid::new_v4(),
            title: "Aptitude".into(),
            description: String::new(),
            duration_days: 10,
            exams_count: 3,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn workbook_is_a_zip_container() {
        let entry = LeaderboardEntry {
            rank: 1,
            student: StudentSummary {
                id: Uuid::new_v4(),
                name: "Asha".into(),
                reg_no: "21CS001".into(),
                email: "asha@college.edu".into(),
                batch: "Dream".into(),
                department: "CSE".into(),
                passout_year: 2025,
            },
            module_id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            average_score: 72.5,
            attendance: AttendanceSummary {
                present: 3,
                absent: 1,
                on_duty: 0,
                partial: 0,
                total: 4,
                percentage: 75,
            },
        };
        let bytes = ExportService::leaderboard_xlsx(&module(), &[entry]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_board_still_exports() {
        let bytes = ExportService::leaderboard_xlsx(&module(), &[]).unwrap();
        assert!(!bytes.is_empty());
    }
}
