/// Split `text` into pieces of at most `max_len` characters.
///
/// Pieces break on line boundaries where possible. A single line longer than
/// `max_len` is cut between characters, never inside one. Blank pieces are
/// dropped.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(!current.is_empty());

        if current_len + sep + line_len <= max_len {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current_len = 0;

        for ch in line.chars() {
            if current_len == max_len {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
    }
    chunks.push(current);

    chunks
        .into_iter()
        .map(|c| c.trim_matches('\n').to_string())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk("a\nb", 100), vec!["a\nb"]);
        assert!(chunk("", 100).is_empty());
    }

    #[test]
    fn breaks_on_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(chunk(text, 9), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn long_line_is_cut_on_char_boundaries() {
        let text = "ééééé";
        let pieces = chunk(text, 2);
        assert_eq!(pieces, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn every_piece_fits_and_nothing_is_lost() {
        let text: String = (0..200).map(|i| format!("{i}. Post gained {i}K views\n")).collect();
        let pieces = chunk(&text, 120);
        assert!(pieces.iter().all(|p| p.chars().count() <= 120));
        assert_eq!(pieces.join("\n"), text.trim_end());
    }
}
