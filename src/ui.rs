use crate::report::{Report, ReportCell, ReportSection, REPORT_COLUMNS};

pub fn render_report(report: &Report) -> String {
    REPORT_HTML
        .replace("{{NAME}}", &escape_html(&report.student.name))
        .replace("{{NUMBER}}", &escape_html(&report.student.student_number))
        .replace("{{CLASS}}", &escape_html(&report.student.class_name))
        .replace("{{MONTH}}", &escape_html(&report.month_name))
        .replace("{{YEAR}}", &report.year.to_string())
        .replace("{{DAY_HEADERS}}", &day_headers(report.days_in_month))
        .replace("{{ROWS}}", &activity_rows(&report.sections))
}

fn day_headers(days_in_month: u32) -> String {
    (1..=REPORT_COLUMNS)
        .map(|day| format!("<th{}>{day}</th>", hidden_attr(day > days_in_month)))
        .collect()
}

fn activity_rows(sections: &[ReportSection]) -> String {
    let mut html = String::new();
    for section in sections {
        if section.is_standalone() {
            html.push_str(&format!(
                "<tr><td colspan=\"2\" class=\"activity-header\">{}</td>{}</tr>\n",
                escape_html(&section.category),
                day_cells(&section.rows[0].cells)
            ));
            continue;
        }
        for (index, row) in section.rows.iter().enumerate() {
            html.push_str("<tr>");
            if index == 0 {
                html.push_str(&format!(
                    "<td rowspan=\"{}\" class=\"activity-header\">{}</td>",
                    section.rows.len(),
                    escape_html(&section.category)
                ));
            }
            html.push_str(&format!(
                "<td>{}</td>{}</tr>\n",
                escape_html(&row.label),
                day_cells(&row.cells)
            ));
        }
    }
    html
}

fn day_cells(cells: &[ReportCell]) -> String {
    cells
        .iter()
        .map(|cell| {
            let class = if cell.is_marked() { " class=\"checked-cell\"" } else { "" };
            match cell {
                ReportCell::Hidden => format!("<td{}></td>", hidden_attr(true)),
                ReportCell::Checked => format!("<td{class}>&#10004;</td>"),
                ReportCell::Count(value) => format!("<td{class}>{value}</td>"),
                ReportCell::Empty => "<td></td>".to_string(),
            }
        })
        .collect()
}

fn hidden_attr(hidden: bool) -> &'static str {
    if hidden { " style=\"display: none;\"" } else { "" }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const REPORT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8" />
  <title>Mutaba'ah Report - {{NAME}}</title>
  <style>
    @page {
      size: A4;
      margin: 1cm;
    }

    body {
      font-family: Arial, sans-serif;
      margin: 0;
      padding: 20px;
    }

    .header {
      text-align: center;
      margin-bottom: 20px;
    }

    .header h2 {
      margin: 0;
    }

    .header h3 {
      margin: 10px 0;
    }

    .student-info {
      display: grid;
      grid-template-columns: auto 1fr auto 1fr;
      gap: 10px;
      margin-bottom: 20px;
    }

    .student-info .value {
      border-bottom: 1px solid #000;
      padding: 0 10px;
      min-width: 200px;
    }

    table {
      width: 100%;
      border-collapse: collapse;
      margin-top: 20px;
    }

    th,
    td {
      border: 1px solid #000;
      padding: 8px;
      text-align: center;
    }

    th,
    .activity-header {
      background-color: #f5f5f5;
    }

    .activity-header {
      font-weight: bold;
    }

    .checked-cell {
      background-color: #d4edda;
    }

    @media print {
      body {
        padding: 0;
      }
    }
  </style>
</head>
<body>
  <div class="header">
    <h2>SEKOLAH KEPRIBADIAN MUSLIMAH</h2>
    <h3>MUTABA'AH YAUMIYAH</h3>
  </div>
  <div class="student-info">
    <div><label>Nama</label></div>
    <div class="value">{{NAME}}</div>
    <div><label>Bulan</label></div>
    <div class="value">{{MONTH}}</div>
    <div><label>Nomor Induk</label></div>
    <div class="value">{{NUMBER}}</div>
    <div><label>Tahun</label></div>
    <div class="value">{{YEAR}}</div>
    <div><label>Kelas</label></div>
    <div class="value">{{CLASS}}</div>
  </div>
  <table>
    <thead>
      <tr>
        <th colspan="2">AMALAN</th>
        <th colspan="31">TANGGAL</th>
      </tr>
      <tr>
        <th colspan="2"></th>
        {{DAY_HEADERS}}
      </tr>
    </thead>
    <tbody>
{{ROWS}}
    </tbody>
  </table>
</body>
</html>
"#;
