#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1_200,
            overlap_chars: 120,
            min_chars: 120,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn chunk_passages(raw: &str, config: &ChunkingConfig) -> Vec<String> {
    let paragraphs: Vec<String> = raw
        .split("\n\n")
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty())
        .collect();

    let mut packed: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if current.is_empty() {
            current = paragraph;
            continue;
        }

        if current.len() + paragraph.len() + 1 <= config.max_chars {
            current.push('\n');
            current.push_str(&paragraph);
        } else {
            packed.push(std::mem::take(&mut current));
            current = paragraph;
        }
    }

    if !current.is_empty() {
        packed.push(current);
    }

    let mut passages = Vec::new();

    for passage in packed {
        if passage.len() <= config.max_chars {
            if passage.len() >= config.min_chars {
                passages.push(passage);
            }
            continue;
        }

        let chars: Vec<char> = passage.chars().collect();
        let step = config
            .max_chars
            .saturating_sub(config.overlap_chars)
            .max(1);

        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.max_chars).min(chars.len());
            passages.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    if passages.is_empty() {
        let whole = normalize_whitespace(raw);
        if !whole.is_empty() {
            passages.push(whole);
        }
    }

    passages
}
